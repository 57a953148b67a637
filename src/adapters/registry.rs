//! 适配器注册表：按名称（不区分大小写）查找，未知或未设置时退回 `generic`

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::betalist::BetaListAdapter;
use super::crunchbase::CrunchbaseAdapter;
use super::generic::GenericAdapter;
use super::indiehackers::IndieHackersAdapter;
use super::producthunt::ProductHuntAdapter;
use super::SubmissionAdapter;
use crate::services::FieldDetector;

pub struct AdapterRegistry {
    generic: Arc<dyn SubmissionAdapter>,
    adapters: HashMap<&'static str, Arc<dyn SubmissionAdapter>>,
}

impl AdapterRegistry {
    /// 只有通用适配器的注册表
    pub fn new(generic: Arc<dyn SubmissionAdapter>) -> Self {
        let mut adapters = HashMap::new();
        adapters.insert(generic.name(), Arc::clone(&generic));
        Self { generic, adapters }
    }

    /// 注册全部内置适配器
    pub fn with_builtin(detector: Arc<dyn FieldDetector>) -> Self {
        let mut registry = Self::new(Arc::new(GenericAdapter::new(detector)));
        registry.register(Arc::new(BetaListAdapter));
        registry.register(Arc::new(IndieHackersAdapter));
        registry.register(Arc::new(ProductHuntAdapter));
        registry.register(Arc::new(CrunchbaseAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SubmissionAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    /// 查找适配器
    pub fn get(&self, name: Option<&str>) -> Arc<dyn SubmissionAdapter> {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Arc::clone(&self.generic);
        };

        match self.adapters.get(name.to_lowercase().as_str()) {
            Some(adapter) => Arc::clone(adapter),
            None => {
                info!("适配器 \"{}\" 不存在，使用 generic", name);
                Arc::clone(&self.generic)
            }
        }
    }

    /// 已注册的适配器名称（排序后）
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.adapters.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
