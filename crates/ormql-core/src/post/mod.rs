//! Post-processing of resolved scopes: hierarchy joins, filters,
//! discriminator restrictions and fragment rendering.

mod fragment;
mod processor;

pub use fragment::{AnsiFragmentRenderer, FragmentRenderer};
pub use processor::{PostProcessor, ScopeFragments};
