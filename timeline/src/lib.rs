// ptl — Pipeline timeline
//
// Library root. Rebuilds lane-packed execution timelines and read-after-write
// register dependencies from retirement traces.

pub mod deps;
pub mod diag;
pub mod emit;
pub mod id;
pub mod lanes;
pub mod lexer;
pub mod operand;
pub mod pass;
pub mod pipeline;
pub mod task;
pub mod trace;
