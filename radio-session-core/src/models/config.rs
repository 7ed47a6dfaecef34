/// Configuration for a [`HandleManager`](crate::lifecycle::manager::HandleManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound, in bytes, on the error text cached on a handle (default: 1024).
    /// Longer messages are cut at a UTF-8 character boundary.
    pub max_error_len: usize,
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_error_len == 0 {
            return Err("max_error_len must be positive".into());
        }
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { max_error_len: 1024 }
    }
}
