use crate::{
    color::NormalizedHsv,
    error::{Error, Result},
    status::{codes, Schema, StatusEntry, TypeDescriptor, WORK_MODE_COLOUR},
};

/// What a control surface wants to happen, independent of the target kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Intent {
    /// Flip power. `current_on` is the locally held value, so rapid toggles
    /// compound off the optimistic state rather than a fresh read.
    Toggle { current_on: bool },
    Brightness(i64),
    Color(NormalizedHsv),
}

fn clamp_brightness(descriptor: Option<&TypeDescriptor>, code: &str, value: i64) -> Result<i64> {
    match descriptor {
        Some(TypeDescriptor::Value(range)) => Ok(range.clamp(value)),
        _ => Err(Error::invalid_value(code, "no integer range declared")),
    }
}

/// Builds the `commands` list for a single device write.
pub fn device_commands(intent: Intent, schema: &Schema) -> Result<Vec<StatusEntry>> {
    let commands = match intent {
        Intent::Toggle { current_on } => vec![StatusEntry::new(codes::SWITCH_LED, !current_on)],
        Intent::Brightness(value) => {
            let code = codes::BRIGHT_VALUE_V2;
            let value = clamp_brightness(schema.device(code), code, value)?;
            vec![StatusEntry::new(code, value)]
        }
        // The device switches to colour mode on its own when it sees
        // colour_data_v2, so no work_mode is sent.
        Intent::Color(color) => vec![StatusEntry::new(codes::COLOUR_DATA_V2, color.to_device())],
    };

    for command in &commands {
        schema.validate_device(command)?;
    }

    Ok(commands)
}

/// Builds the property set for a single group write.
///
/// Groups have no combined colour code, so a colour intent always carries
/// `work_mode: "colour"` alongside the packed `colour_data`, switching the
/// group out of white/scene/music mode.
pub fn group_properties(intent: Intent, schema: &Schema) -> Result<Vec<StatusEntry>> {
    let properties = match intent {
        Intent::Toggle { current_on } => vec![StatusEntry::new(codes::SWITCH_LED, !current_on)],
        Intent::Brightness(value) => {
            let code = codes::BRIGHT_VALUE;
            let value = clamp_brightness(schema.group(code), code, value)?;
            vec![StatusEntry::new(code, value)]
        }
        Intent::Color(color) => vec![
            StatusEntry::new(codes::WORK_MODE, WORK_MODE_COLOUR),
            StatusEntry::new(codes::COLOUR_DATA, color.to_device().to_hex()),
        ],
    };

    for property in &properties {
        schema.validate_group(property)?;
    }

    Ok(properties)
}
