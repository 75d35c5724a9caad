//! # payment-adapters
//!
//! Implementations of the `PaymentGateway` port.
//!
//! | Adapter            | Feature            |
//! |--------------------|--------------------|
//! | `SimulatedGateway` | always (mock mode) |
//! | `PaystackGateway`  | `gateway-paystack` |

pub mod simulated;
#[cfg(feature = "gateway-paystack")]
pub mod paystack;

pub use simulated::SimulatedGateway;
#[cfg(feature = "gateway-paystack")]
pub use paystack::PaystackGateway;
