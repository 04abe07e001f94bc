pub mod books;

use std::sync::Arc;

use shelf_auth::AuthGate;
use shelf_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, gate: Arc<AuthGate>) {
    registry.register(books::create_module(gate));
}
