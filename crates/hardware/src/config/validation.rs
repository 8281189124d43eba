//! Custom validation functions for device configuration.
//!
//! This module provides validators for:
//! - Regex patterns (valid regex syntax)
//! - Evalexpr formulas (valid expression syntax)
//! - Additional custom validation rules

use serde_valid::validation::Error as ValidationError;

/// Validate that a string is a valid regex pattern.
///
/// This validator is used by `serde_valid` on fields marked with
/// `#[validate(custom(validate_regex_pattern))]`.
///
/// # Arguments
///
/// * `pattern` - Optional regex pattern string to validate
///
/// # Returns
///
/// * `Ok(())` if pattern is None or a valid regex
/// * `Err(ValidationError)` if pattern is invalid
pub fn validate_regex_pattern(pattern: &Option<String>) -> Result<(), ValidationError> {
    if let Some(ref p) = pattern {
        validate_regex_string(p)?;
    }
    Ok(())
}

/// Validate that a string is a valid regex pattern (non-optional version).
///
/// # Arguments
///
/// * `pattern` - Regex pattern string to validate
///
/// # Returns
///
/// * `Ok(())` if pattern is a valid regex
/// * `Err(ValidationError)` if pattern is invalid
pub fn validate_regex_string(pattern: &str) -> Result<(), ValidationError> {
    match regex::Regex::new(pattern) {
        Ok(_) => Ok(()),
        Err(e) => Err(ValidationError::Custom(format!(
            "Invalid regex pattern '{}': {}",
            pattern, e
        ))),
    }
}

/// Validate that a string is a valid evalexpr formula.
///
/// This validator is used by `serde_valid` on fields marked with
/// `#[validate(custom(validate_evalexpr_formula))]`.
///
/// The validator checks basic syntax by attempting to build an expression tree.
/// Note that variable references are not validated here - they are resolved
/// at runtime when the formula is evaluated.
///
/// # Arguments
///
/// * `formula` - The formula string to validate
///
/// # Returns
///
/// * `Ok(())` if formula has valid syntax
/// * `Err(ValidationError)` if formula has syntax errors
pub fn validate_evalexpr_formula(formula: &String) -> Result<(), ValidationError> {
    // evalexpr::build_operator_tree validates syntax without needing values
    match evalexpr::build_operator_tree(formula) {
        Ok(_) => Ok(()),
        Err(e) => Err(ValidationError::Custom(format!(
            "Invalid formula '{}': {}",
            formula, e
        ))),
    }
}

/// Validate baud rate is within acceptable range.
///
/// Standard baud rates: 300, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600
pub fn validate_baud_rate(baud_rate: u32) -> Result<(), ValidationError> {
    const MIN_BAUD: u32 = 300;
    const MAX_BAUD: u32 = 921600;

    if !(MIN_BAUD..=MAX_BAUD).contains(&baud_rate) {
        return Err(ValidationError::Custom(format!(
            "Baud rate {} is out of range ({}-{})",
            baud_rate, MIN_BAUD, MAX_BAUD
        )));
    }
    Ok(())
}

/// Validate timeout is within acceptable range.
pub fn validate_timeout_ms(timeout_ms: u32) -> Result<(), ValidationError> {
    const MIN_TIMEOUT: u32 = 1;
    const MAX_TIMEOUT: u32 = 60000;

    if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout_ms) {
        return Err(ValidationError::Custom(format!(
            "Timeout {} ms is out of range ({}-{} ms)",
            timeout_ms, MIN_TIMEOUT, MAX_TIMEOUT
        )));
    }
    Ok(())
}

/// Validate that a numeric range is valid (min <= max).
pub fn validate_range(range: &Option<(f64, f64)>) -> Result<(), ValidationError> {
    if let Some((min, max)) = range {
        if min > max {
            return Err(ValidationError::Custom(format!(
                "Invalid range: min ({}) is greater than max ({})",
                min, max
            )));
        }
    }
    Ok(())
}

/// Validate a device configuration completely.
///
/// This performs additional cross-field validation beyond what
/// serde_valid provides per-field.
pub fn validate_device_config(
    config: &super::schema::DeviceConfig,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Validate all regex patterns in responses
    for (name, response) in &config.responses {
        if let Some(ref pattern) = response.pattern {
            if let Err(e) = validate_regex_string(pattern) {
                errors.push(ValidationError::Custom(format!(
                    "Response '{}': {}",
                    name, e
                )));
            }
        }
    }

    // Validate all conversion formulas
    for (name, conversion) in &config.conversions {
        if let Err(e) = validate_evalexpr_formula(&conversion.formula) {
            errors.push(ValidationError::Custom(format!(
                "Conversion '{}': {}",
                name, e
            )));
        }
    }

    // Validate parameter ranges
    for (name, param) in &config.parameters {
        if let Err(e) = validate_range(&param.range) {
            errors.push(ValidationError::Custom(format!(
                "Parameter '{}': {}",
                name, e
            )));
        }
    }

    // Validate command references
    for (name, mapping) in &config.trait_mapping {
        for (method_name, method) in &mapping.methods {
            // Check command exists if specified (polling-only methods may not have a command)
            if let Some(ref command) = method.command {
                if !config.commands.contains_key(command) {
                    errors.push(ValidationError::Custom(format!(
                        "Trait mapping '{}.{}': references non-existent command '{}'",
                        name, method_name, command
                    )));
                }
            }

            // Check conversion exists if referenced
            if let Some(ref conv) = method.input_conversion {
                if !config.conversions.contains_key(conv) {
                    errors.push(ValidationError::Custom(format!(
                        "Trait mapping '{}.{}': references non-existent conversion '{}'",
                        name, method_name, conv
                    )));
                }
            }

            if let Some(ref conv) = method.output_conversion {
                if !config.conversions.contains_key(conv) {
                    errors.push(ValidationError::Custom(format!(
                        "Trait mapping '{}.{}': references non-existent conversion '{}'",
                        name, method_name, conv
                    )));
                }
            }
        }
    }

    // Validate command response references
    for (name, cmd) in &config.commands {
        if let Some(ref response_name) = cmd.response {
            if !config.responses.contains_key(response_name) {
                errors.push(ValidationError::Custom(format!(
                    "Command '{}': references non-existent response '{}'",
                    name, response_name
                )));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
