use training::{executable_utils::initialize_executable, trainer::Trainer};

fn main() -> anyhow::Result<()> {
    let config = initialize_executable()?;

    let outcome = Trainer::new(config.trainer)
        .run()
        .inspect_err(|e| tracing::error!(error = %e, "Training failed"))?;

    tracing::info!(
        model = %outcome.selected,
        accuracy = outcome.bundle.metadata.accuracy,
        training_samples = outcome.bundle.metadata.training_samples,
        "Model training completed and saved"
    );
    Ok(())
}
