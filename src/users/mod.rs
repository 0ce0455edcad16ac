use serde::{Deserialize, Serialize};

use crate::behavior::{AuthMethod, BehaviorSelector, BehaviorVariant};

/// One simulated user. Created per dispatch request, immutable, discarded
/// after its outcome is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedUser {
    pub id: u32,
    pub username: String,
    pub display_name: String,
    pub variant: BehaviorVariant,
    /// Concrete ordered method plan, fixed at creation so a seeded run is
    /// fully reproducible.
    pub methods: Vec<AuthMethod>,
}

/// Batch generation of simulated users.
pub struct UserGenerator;

impl UserGenerator {
    /// Generate `count` users named `{prefix}{start}..`, each with a
    /// variant and method plan drawn from the selector.
    pub fn generate(
        prefix: &str,
        start: u32,
        count: usize,
        selector: &mut BehaviorSelector,
    ) -> Vec<SimulatedUser> {
        (0..count as u32)
            .map(|i| {
                let id = start + i;
                let username = format!("{}{}", prefix, id);
                let variant = selector.choose_variant();
                let methods = selector.plan_for(variant);
                SimulatedUser {
                    id,
                    display_name: format!("Biometric User {}", username),
                    username,
                    variant,
                    methods,
                }
            })
            .collect()
    }

    /// The load batch: `loaduser1..N`.
    pub fn load_batch(count: usize, selector: &mut BehaviorSelector) -> Vec<SimulatedUser> {
        Self::generate("loaduser", 1, count, selector)
    }

    /// The demonstration batch: `user1..N`.
    pub fn demo_batch(count: usize, selector: &mut BehaviorSelector) -> Vec<SimulatedUser> {
        Self::generate("user", 1, count, selector)
    }
}
