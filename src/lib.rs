use std::sync::Arc;

use ocr_conn::ocr::ExtractorPool;

pub mod api;
pub mod build_info;
pub mod db;
pub mod model;
pub mod server;
pub mod storage;
pub mod util;

use storage::UploadPolicy;
use util::config::Config;

/// 应用状态结构
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<dyn db::Database>,
    pub storage: Arc<dyn storage::Storage>,
    pub config: Arc<Config>,
    /// 并发受限的OCR抽取池
    pub extractor: Arc<ExtractorPool>,
    pub upload_policy: Arc<UploadPolicy>,
}

impl AppState {
    pub fn new(
        config: Config,
        database: Arc<dyn db::Database>,
        storage: Arc<dyn storage::Storage>,
    ) -> Self {
        let capacity = match config.ocr.max_concurrent {
            0 => ExtractorPool::auto_size(),
            n => n,
        };
        let extractor = Arc::new(ExtractorPool::new(config.ocr.engine_options(), capacity));
        tracing::info!(
            event = "ocr.pool.init",
            capacity = capacity,
            enabled = config.ocr.enabled,
            "OCR抽取池初始化完成"
        );
        let upload_policy = Arc::new(UploadPolicy {
            allowed_extensions: config.uploads.allowed_extensions.clone(),
        });
        Self {
            database,
            storage,
            config: Arc::new(config),
            extractor,
            upload_policy,
        }
    }

    /// 上传目录（存储根目录）
    pub fn upload_folder(&self) -> &std::path::Path {
        self.storage.root()
    }
}
