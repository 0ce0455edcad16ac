// Behavior selection module
//
// Assigns each simulated user a behavioral variant and, for Mixed users,
// a concrete method subset. All randomness flows through an injectable
// StdRng so seeded runs are reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One authentication method exposed by the target API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    WebAuthn,
    Fingerprint,
    Face,
    Qr,
}

impl AuthMethod {
    /// All methods, in the order a Full session exercises them.
    pub const ALL: [AuthMethod; 4] = [
        AuthMethod::WebAuthn,
        AuthMethod::Fingerprint,
        AuthMethod::Face,
        AuthMethod::Qr,
    ];

    /// Two-phase methods issue a begin call and, only on its success,
    /// a dependent confirm call.
    pub fn is_two_phase(&self) -> bool {
        matches!(self, AuthMethod::WebAuthn | AuthMethod::Qr)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::WebAuthn => "webauthn",
            AuthMethod::Fingerprint => "fingerprint",
            AuthMethod::Face => "face",
            AuthMethod::Qr => "qr",
        }
    }
}

/// The fixed behavioral pattern assigned to a simulated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorVariant {
    /// All four methods, sequentially.
    Full,
    WebAuthnOnly,
    QrOnly,
    /// A random subset of 2-3 methods in random order.
    Mixed,
}

impl BehaviorVariant {
    pub const ALL: [BehaviorVariant; 4] = [
        BehaviorVariant::Full,
        BehaviorVariant::WebAuthnOnly,
        BehaviorVariant::QrOnly,
        BehaviorVariant::Mixed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BehaviorVariant::Full => "full",
            BehaviorVariant::WebAuthnOnly => "webauthn_only",
            BehaviorVariant::QrOnly => "qr_only",
            BehaviorVariant::Mixed => "mixed",
        }
    }
}

/// Chooses variants and method plans for simulated users.
pub struct BehaviorSelector {
    rng: StdRng,
}

impl BehaviorSelector {
    /// Selector backed by an entropy-seeded generator.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Selector with a fixed seed for reproducible runs and tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick a variant uniformly. Each call is independent.
    pub fn choose_variant(&mut self) -> BehaviorVariant {
        BehaviorVariant::ALL[self.rng.gen_range(0..BehaviorVariant::ALL.len())]
    }

    /// Draw 2 or 3 distinct methods without replacement, then randomize
    /// their order.
    pub fn choose_mixed_methods(&mut self) -> Vec<AuthMethod> {
        let count = self.rng.gen_range(2..=3);
        let mut methods: Vec<AuthMethod> = AuthMethod::ALL
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();
        methods.shuffle(&mut self.rng);
        methods
    }

    /// Expand a variant into the ordered method list a session executes.
    pub fn plan_for(&mut self, variant: BehaviorVariant) -> Vec<AuthMethod> {
        match variant {
            BehaviorVariant::Full => AuthMethod::ALL.to_vec(),
            BehaviorVariant::WebAuthnOnly => vec![AuthMethod::WebAuthn],
            BehaviorVariant::QrOnly => vec![AuthMethod::Qr],
            BehaviorVariant::Mixed => self.choose_mixed_methods(),
        }
    }
}

impl Default for BehaviorSelector {
    fn default() -> Self {
        Self::new()
    }
}
