//! Configuration handed to the browser-side DICOM decoding library.
//!
//! Only the shape is owned here; decoding itself happens in the client.

use serde::{Deserialize, Serialize};

const MAX_DEFAULT_WEB_WORKERS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecoderConfig {
    pub max_web_workers: usize,
    pub start_web_workers_on_demand: bool,
    pub task_configuration: TaskConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskConfiguration {
    pub decode_task: DecodeTaskConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodeTaskConfig {
    pub initialize_codecs_on_startup: bool,
    pub strict: bool,
    pub codecs: CodecFlags,
}

/// Per-transfer-syntax codec switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodecFlags {
    pub jpeg_baseline: bool,
    pub jpeg_lossless: bool,
    pub jpeg_ls: bool,
    pub jpeg2000: bool,
    pub rle: bool,
    pub big_endian: bool,
}

impl Default for CodecFlags {
    fn default() -> Self {
        Self {
            jpeg_baseline: true,
            jpeg_lossless: true,
            jpeg_ls: true,
            jpeg2000: true,
            rle: true,
            big_endian: true,
        }
    }
}

impl CodecFlags {
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("jpegBaseline", self.jpeg_baseline),
            ("jpegLossless", self.jpeg_lossless),
            ("jpegLs", self.jpeg_ls),
            ("jpeg2000", self.jpeg2000),
            ("rle", self.rle),
            ("bigEndian", self.big_endian),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_web_workers: default_web_workers(),
            start_web_workers_on_demand: true,
            task_configuration: TaskConfiguration::default(),
        }
    }
}

/// Available parallelism, at least one, at most seven.
pub fn default_web_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DEFAULT_WEB_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_worker_count_is_bounded() {
        let config = DecoderConfig::default();
        assert!((1..=MAX_DEFAULT_WEB_WORKERS).contains(&config.max_web_workers));
        assert!(config.start_web_workers_on_demand);
        assert_eq!(config.task_configuration.decode_task.codecs.enabled().len(), 6);
    }

    #[test]
    fn serializes_camel_case() {
        let config = DecoderConfig {
            max_web_workers: 2,
            ..DecoderConfig::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["maxWebWorkers"], 2);
        assert_eq!(json["startWebWorkersOnDemand"], true);
        assert_eq!(
            json["taskConfiguration"]["decodeTask"]["initializeCodecsOnStartup"],
            false
        );
        assert_eq!(json["taskConfiguration"]["decodeTask"]["codecs"]["jpeg2000"], true);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: DecoderConfig = serde_json::from_value(json!({
            "maxWebWorkers": 3,
            "taskConfiguration": {"decodeTask": {"strict": true, "codecs": {"rle": false}}}
        }))
        .unwrap();
        assert_eq!(config.max_web_workers, 3);
        assert!(config.start_web_workers_on_demand);
        assert!(config.task_configuration.decode_task.strict);
        assert!(!config.task_configuration.decode_task.codecs.rle);
        assert!(config.task_configuration.decode_task.codecs.jpeg_ls);
    }
}
