use std::sync::Arc;

use crate::allocator::ClickIdAllocator;
use crate::crm::CrmForwarder;
use crate::dispatch::Dispatcher;
use crate::events::{EventEnricher, MessengerLinks};
use crate::reconcile::Reconciler;
use crate::services::geoip::GeoIpProvider;
use crate::store::RecordStore;

/// 请求处理共享的组件，启动时构造一次，通过 `web::Data` 注入
pub struct AppContext {
    pub allocator: Arc<ClickIdAllocator>,
    pub store: Arc<RecordStore>,
    pub forwarder: Arc<CrmForwarder>,
    pub dispatcher: Dispatcher,
    pub enricher: EventEnricher,
    pub geoip: GeoIpProvider,
    pub links: MessengerLinks,
    pub reconciler: Reconciler,
    /// 计数器不可用时返回 500 而不是降级 id
    pub strict_ids: bool,
}

impl AppContext {
    pub fn new(
        allocator: Arc<ClickIdAllocator>,
        store: Arc<RecordStore>,
        forwarder: Arc<CrmForwarder>,
        dispatcher: Dispatcher,
        enricher: EventEnricher,
    ) -> Self {
        Self {
            allocator,
            reconciler: Reconciler::new(Arc::clone(&store)),
            store,
            forwarder,
            dispatcher,
            enricher,
            geoip: GeoIpProvider::disabled(),
            links: MessengerLinks::default(),
            strict_ids: false,
        }
    }

    pub fn with_geoip(mut self, geoip: GeoIpProvider) -> Self {
        self.geoip = geoip;
        self
    }

    pub fn with_links(mut self, links: MessengerLinks) -> Self {
        self.links = links;
        self
    }

    pub fn with_strict_ids(mut self, strict: bool) -> Self {
        self.strict_ids = strict;
        self
    }
}
