//! 打印机目录
//!
//! 任意时刻至多一台默认打印机。切换默认打印机是一次写锁内的读改写。

use pacs_core::{PacsError, Printer, Result};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// 打印机目录
#[derive(Debug, Default)]
pub struct PrinterDirectory {
    printers: RwLock<BTreeMap<String, Printer>>,
}

impl PrinterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动时从配置批量加载
    pub async fn load(&self, printers: Vec<Printer>) -> Result<usize> {
        let mut loaded = 0;
        for printer in printers {
            self.add(printer).await?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// 默认打印机在前，其余按名称升序
    pub async fn list(&self) -> Vec<Printer> {
        let printers = self.printers.read().await;
        let mut list: Vec<Printer> = printers.values().cloned().collect();
        // BTreeMap 已按名称排序，稳定排序只需把默认项提前
        list.sort_by_key(|printer| !printer.is_default);
        list
    }

    pub async fn get(&self, name: &str) -> Result<Printer> {
        self.printers
            .read()
            .await
            .get(name.trim())
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    pub async fn default_printer(&self) -> Option<Printer> {
        self.printers
            .read()
            .await
            .values()
            .find(|printer| printer.is_default)
            .cloned()
    }

    /// 添加打印机；若标记为默认则同时撤销原默认打印机
    ///
    /// 名称与 AE Title 去除首尾空白后保存，与按名称查找时的处理一致。
    pub async fn add(&self, mut printer: Printer) -> Result<Printer> {
        printer.name = printer.name.trim().to_string();
        printer.ae_title = printer.ae_title.trim().to_string();
        printer.host = printer.host.trim().to_string();
        printer.validate()?;

        let mut printers = self.printers.write().await;
        if printers.contains_key(&printer.name) {
            return Err(PacsError::Conflict(format!("printer {} already exists", printer.name)));
        }
        if printer.is_default {
            clear_default(&mut printers);
        }
        printers.insert(printer.name.clone(), printer.clone());

        tracing::info!(
            "Registered printer {} ({}@{}:{}){}",
            printer.name,
            printer.ae_title,
            printer.host,
            printer.port,
            if printer.is_default { " as default" } else { "" }
        );
        Ok(printer)
    }

    /// 删除打印机；删除默认打印机后目录中没有默认项
    pub async fn remove(&self, name: &str) -> Result<Printer> {
        let removed = self
            .printers
            .write()
            .await
            .remove(name.trim())
            .ok_or_else(|| not_found(name))?;
        tracing::info!("Removed printer {}", name);
        Ok(removed)
    }

    pub async fn set_default(&self, name: &str) -> Result<()> {
        let name = name.trim();
        let mut printers = self.printers.write().await;
        if !printers.contains_key(name) {
            return Err(not_found(name));
        }

        clear_default(&mut printers);
        if let Some(printer) = printers.get_mut(name) {
            printer.is_default = true;
        }

        tracing::info!("Default printer set to {}", name);
        Ok(())
    }
}

fn clear_default(printers: &mut BTreeMap<String, Printer>) {
    for printer in printers.values_mut() {
        printer.is_default = false;
    }
}

fn not_found(name: &str) -> PacsError {
    PacsError::NotFound(format!("printer {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn printer(name: &str, is_default: bool) -> Printer {
        Printer {
            name: name.to_string(),
            ae_title: format!("AE_{}", name.to_uppercase()),
            host: "10.0.0.20".to_string(),
            port: 104,
            description: None,
            is_default,
        }
    }

    async fn default_count(directory: &PrinterDirectory) -> usize {
        directory.list().await.iter().filter(|p| p.is_default).count()
    }

    #[tokio::test]
    async fn test_list_is_default_first_then_by_name() {
        let directory = PrinterDirectory::new();
        directory
            .load(vec![printer("charlie", false), printer("bravo", true), printer("alpha", false)])
            .await
            .unwrap();

        let names: Vec<String> = directory.list().await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["bravo", "alpha", "charlie"]);
    }

    #[tokio::test]
    async fn test_set_default_switches_atomically() {
        let directory = PrinterDirectory::new();
        directory
            .load(vec![printer("a", true), printer("b", false)])
            .await
            .unwrap();

        directory.set_default("b").await.unwrap();
        assert_eq!(directory.default_printer().await.unwrap().name, "b");
        assert_eq!(default_count(&directory).await, 1);

        assert!(matches!(directory.set_default("zzz").await, Err(PacsError::NotFound(_))));
        assert_eq!(directory.default_printer().await.unwrap().name, "b");
    }

    #[tokio::test]
    async fn test_adding_default_demotes_previous() {
        let directory = PrinterDirectory::new();
        directory.add(printer("a", true)).await.unwrap();
        directory.add(printer("b", true)).await.unwrap();

        assert_eq!(directory.default_printer().await.unwrap().name, "b");
        assert_eq!(default_count(&directory).await, 1);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicates_and_bad_fields() {
        let directory = PrinterDirectory::new();
        directory.add(printer("a", false)).await.unwrap();

        assert!(matches!(directory.add(printer("a", true)).await, Err(PacsError::Conflict(_))));
        assert!(directory.default_printer().await.is_none());

        let mut bad = printer("", false);
        bad.ae_title = "THIS_AE_TITLE_IS_TOO_LONG".to_string();
        let err = directory.add(bad).await.unwrap_err();
        assert_eq!(err.violated_fields(), vec!["name", "aeTitle"]);
    }

    #[tokio::test]
    async fn test_padded_names_are_stored_trimmed() {
        let directory = PrinterDirectory::new();
        let mut padded = printer("hp-film-1", true);
        padded.name = " hp-film-1 ".to_string();
        padded.ae_title = "AE_HP ".to_string();

        let stored = directory.add(padded).await.unwrap();
        assert_eq!(stored.name, "hp-film-1");
        assert_eq!(stored.ae_title, "AE_HP");
        assert_eq!(directory.get("hp-film-1").await.unwrap(), stored);
        assert_eq!(directory.get("hp-film-1 ").await.unwrap(), stored);

        assert!(matches!(
            directory.add(printer("hp-film-1", false)).await,
            Err(PacsError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_default_leaves_none() {
        let directory = PrinterDirectory::new();
        directory
            .load(vec![printer("a", true), printer("b", false)])
            .await
            .unwrap();

        directory.remove("a").await.unwrap();
        assert!(directory.default_printer().await.is_none());
        assert!(matches!(directory.remove("a").await, Err(PacsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_set_default_keeps_single_default() {
        let directory = Arc::new(PrinterDirectory::new());
        let names: Vec<String> = (0..8).map(|i| format!("p{}", i)).collect();
        for name in &names {
            directory.add(printer(name, false)).await.unwrap();
        }

        let mut handles = Vec::new();
        for round in 0..64 {
            let directory = directory.clone();
            let name = names[round % names.len()].clone();
            handles.push(tokio::spawn(async move {
                directory.set_default(&name).await.unwrap();
                assert!(default_count(&directory).await <= 1);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(default_count(&directory).await, 1);
    }
}
