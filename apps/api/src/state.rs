use rigger_application::ProvisioningService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub provisioning_service: ProvisioningService,
}
