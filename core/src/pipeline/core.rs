//! Stable entry points over [`PipelineController`].

use std::path::Path;

use crate::pipeline::config::PipelineConfig;
use crate::pipeline::controller::PipelineController;
use crate::pipeline::io::{open_sink, open_source, InputSource, OutputSink};
use crate::telemetry::TelemetrySnapshot;
use crate::types::PipelineError;

/// Run one pipeline from `input` to `output`.
pub fn transform_stream(
    input: InputSource,
    output: OutputSink,
    config: &PipelineConfig,
) -> Result<TelemetrySnapshot, PipelineError> {
    let controller = PipelineController::new(config.clone())?;
    controller.run(open_source(input), open_sink(output))
}

/// Like [`transform_stream`], also writing the untransformed frames to `origin`.
pub fn transform_stream_with_origin(
    input: InputSource,
    output: OutputSink,
    origin: OutputSink,
    config: &PipelineConfig,
) -> Result<TelemetrySnapshot, PipelineError> {
    let controller = PipelineController::new(config.clone())?;
    controller
        .start_with_origin(open_source(input), open_sink(output), Some(open_sink(origin)))?
        .join()
}

/// Container file to container file. The output's TRANSFORMED flag is the
/// inverse of the input's, so running this twice with the same key
/// restores the original file byte for byte.
pub fn transform_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    config: &PipelineConfig,
) -> Result<TelemetrySnapshot, PipelineError> {
    transform_stream(
        InputSource::ContainerFile(input_path.as_ref().to_path_buf()),
        OutputSink::ContainerFile(output_path.as_ref().to_path_buf()),
        config,
    )
}
