/// Collaborators the sync machine queries while deciding whether an asset is complete.
pub trait SyncEnvironment: Send + Sync {
    /// Enabled operators currently known locally.
    fn enabled_operator_count(&self) -> usize;

    /// Expected roster size at `height`.
    fn estimated_operator_count(&self, height: u64) -> usize;

    /// Whether the payment subsystem already holds enough winner votes.
    fn has_enough_payment_data(&self, enabled_operators: usize) -> bool;

    /// Called once governance sync completes; activates the local operator.
    fn on_governance_synced(&self) {}

    /// Called when the sync restarts from `Initial`. Drop any data gathered
    /// for the previous pass.
    fn on_reset(&self) {}
}
