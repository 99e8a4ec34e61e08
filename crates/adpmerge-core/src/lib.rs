// Library root: the player filter, name normalizer, matchers and merge
// orchestrator shared by the binary and the integration tests.

pub mod events;
pub mod filter;
pub mod matching;
pub mod merge;
pub mod normalize;
pub mod player;
pub mod ranking;
