use power_bench::logging::{self, OutputFormat, TracingConfig};
use tracing::Level;

#[test]
fn test_init_is_idempotent() {
    let config = TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Json);
    assert!(logging::init(config).is_ok());
    assert!(logging::init(TracingConfig::default()).is_ok());
    tracing::info!("still logging after second init");
}

#[test]
fn test_rejects_unknown_format() {
    assert!("yaml".parse::<OutputFormat>().is_err());
    assert_eq!("Pretty".parse::<OutputFormat>().unwrap(), OutputFormat::Pretty);
}
