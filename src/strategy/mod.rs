//! Trading strategy implementation.
//!
//! Contains the core logic for:
//! - Turning news leads into priced candidates
//! - Normalizing spreads into a cash allocation
//! - Sizing positions and placing bracket orders

mod allocator;
mod analyst;
mod executor;
mod sizer;

pub use allocator::{
    correct_allocate_percentages, percentage_map, Allocation, AllocationError, DOMINANCE_FACTOR,
};
pub use analyst::{by_ticker, Analyst, Candidate};
pub use executor::{bracket_for, OrderExecutor, OrderRejection, Placement};
pub use sizer::{OrderPlan, PositionSizer};
