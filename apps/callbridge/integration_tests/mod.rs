// Integration tests for the callbridge host: the replay transport driving a
// configured orchestrator and loader end to end.

mod replay_pipeline;
