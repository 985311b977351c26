// src/tests/mod.rs

mod test_path_normalizer;
mod test_policy_store;
