use crate::coordinator::DownloadCoordinator;
use crate::error::{ErrorKind, Result};
use crate::origin::Origin;
use crate::proxy::ProxyCacheFetcher;
use crate::response::{AssetRequest, AssetResponse};
use exn::ResultExt;
use skycache_storage::{AssetPath, AssetStore};
use std::sync::Arc;

/// Entry point for asset requests: validate the path, then serve it from the
/// cache or through the origin.
#[derive(Clone, Debug)]
pub struct AssetService {
    proxy: ProxyCacheFetcher,
}

impl AssetService {
    pub fn new(store: AssetStore, coordinator: Arc<DownloadCoordinator>, origin: Origin) -> Self {
        Self {
            proxy: ProxyCacheFetcher::new(store, coordinator, origin),
        }
    }

    pub fn proxy(&self) -> &ProxyCacheFetcher {
        &self.proxy
    }

    /// A path that fails validation is reported as absent; it never touches
    /// the filesystem or the origin.
    pub async fn serve(&self, request: AssetRequest) -> Result<AssetResponse> {
        let asset = AssetPath::parse(&request.path).or_raise(|| ErrorKind::NotFound(request.path.clone()))?;
        let url = self.proxy.origin().url_for(&request.path, request.query.as_deref())?;
        self.proxy.serve(&request, &asset, url).await
    }
}
