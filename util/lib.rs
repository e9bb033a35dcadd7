/*!
Small helpers shared by the wayfarer crates.
*/

pub mod finite;
pub mod progress_counter;
