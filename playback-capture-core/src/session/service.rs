use std::path::Path;
use std::sync::Arc;

use crate::models::authorization::CaptureAuthorization;
use crate::models::error::CaptureError;
use crate::models::selectors::SelectorSet;
use crate::models::settings::RecorderSettings;
use crate::models::state::SessionState;
use crate::session::controller::CaptureSession;
use crate::session::listeners::SubscriptionId;
use crate::session::request::SessionRequest;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::selector_resolver::SelectorResolver;
use crate::traits::session_listener::SessionListener;

/// Host-facing entry point: application ids and file names in, recording out.
///
/// Resolves app ids to selectors once per start and places relative
/// destinations under the storage root before handing off to
/// [`CaptureSession`].
pub struct CaptureService<P: CaptureProvider, R: SelectorResolver> {
    session: CaptureSession<P>,
    resolver: R,
}

impl<P: CaptureProvider, R: SelectorResolver> CaptureService<P, R> {
    pub fn new(provider: P, resolver: R, settings: RecorderSettings) -> Self {
        Self {
            session: CaptureSession::with_settings(provider, settings),
            resolver,
        }
    }

    pub fn session(&self) -> &CaptureSession<P> {
        &self.session
    }

    pub fn start_session(
        &self,
        authorization: Option<CaptureAuthorization>,
        destination: &Path,
        app_ids: &[String],
    ) -> Result<(), CaptureError> {
        let selectors = SelectorSet::resolve(&self.resolver, app_ids);
        let destination = self.session.settings().resolve_destination(destination);
        log::debug!(
            "Starting capture of {:?} (selectors {:?}) into {}",
            app_ids,
            selectors.selectors(),
            destination.display()
        );
        self.session.start(authorization, destination, selectors)
    }

    pub fn start_request(
        &self,
        authorization: Option<CaptureAuthorization>,
        request: &SessionRequest,
    ) -> Result<(), CaptureError> {
        self.start_session(authorization, &request.file_name, &request.packages)
    }

    pub fn stop_session(&self) {
        self.session.stop();
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) -> SubscriptionId {
        self.session.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.session.unsubscribe(id)
    }
}
