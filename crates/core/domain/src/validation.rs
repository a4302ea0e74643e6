//! 启动期配置校验：任何失败都在 Poller 启动前直接返回。

use crate::plc::PlcConfig;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("plc name must not be empty")]
    EmptyPlcName,
    #[error("duplicate plc name: {0}")]
    DuplicatePlc(String),
    #[error("plc {0} has no address")]
    EmptyAddress(String),
    #[error("plc {0} has an empty tag name")]
    EmptyTagName(String),
    #[error("plc {plc}: duplicate tag name {tag}")]
    DuplicateTag { plc: String, tag: String },
    #[error("plc {plc}: tag {tag} has invalid scan interval {interval}")]
    InvalidInterval {
        plc: String,
        tag: String,
        interval: f64,
    },
}

/// 校验单个 PLC：地址非空、点位名唯一、扫描周期 > 0。
pub fn validate_plc(config: &PlcConfig) -> Result<(), ValidationError> {
    if config.name.trim().is_empty() {
        return Err(ValidationError::EmptyPlcName);
    }
    if config.descriptor.address.trim().is_empty() {
        return Err(ValidationError::EmptyAddress(config.name.clone()));
    }
    let mut seen = HashSet::new();
    for tag in &config.tags {
        if tag.name.is_empty() {
            return Err(ValidationError::EmptyTagName(config.name.clone()));
        }
        if !seen.insert(tag.name.as_str()) {
            return Err(ValidationError::DuplicateTag {
                plc: config.name.clone(),
                tag: tag.name.clone(),
            });
        }
        if tag.scan_interval().is_none() {
            return Err(ValidationError::InvalidInterval {
                plc: config.name.clone(),
                tag: tag.name.clone(),
                interval: tag.scan_interval_secs,
            });
        }
    }
    Ok(())
}

/// 校验一组 PLC：逐个校验并要求名称唯一。
pub fn validate_plc_set(configs: &[PlcConfig]) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for config in configs {
        validate_plc(config)?;
        if !names.insert(config.name.as_str()) {
            return Err(ValidationError::DuplicatePlc(config.name.clone()));
        }
    }
    Ok(())
}
