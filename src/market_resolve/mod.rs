// ============================================================================
// Market Resolve Module - Core Market Engine
// ============================================================================
//
// This module contains the binary outcome market engine:
//   - market: Market account state, outcomes, address derivation
//   - amm: Constant product pricing with the bootstrap rule
//   - lifecycle: Open -> Settled gates and settlement policy
//   - redemption: Pro-rata payout against the frozen pool
//   - markets: MarketManager running each operation atomically
//
// ============================================================================

pub mod amm;
pub mod lifecycle;
pub mod market;
pub mod markets;
pub mod redemption;

pub use amm::*;
pub use lifecycle::*;
pub use market::*;
pub use markets::*;
pub use redemption::*;
