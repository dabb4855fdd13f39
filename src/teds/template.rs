//! Standard TEDS templates
//!
//! Field tables for the basic TEDS, the accelerometer/force template (25),
//! the thermocouple template (36) and the calibration block that closes
//! every template.

use super::element::ElementKind::{self, *};

pub type FieldSpec = (&'static str, ElementKind);

pub const ACCEL_FORCE_TEMPLATE: u64 = 25;
pub const THERMOCOUPLE_TEMPLATE: u64 = 36;

pub const BASIC: &[FieldSpec] = &[
    ("manufacturer_id", UnInt { bits: 14 }),
    ("model_number", UnInt { bits: 15 }),
    ("version_letter", UnInt { bits: 5 }),
    ("version_number", UnInt { bits: 6 }),
    ("serial_number", UnInt { bits: 24 }),
    ("start_selector", UnInt { bits: 2 }),
    ("template_id", UnInt { bits: 8 }),
];

pub const ACCEL_FORCE_SELECT: &[FieldSpec] = &[
    ("acceleration_force", UnInt { bits: 1 }),
    ("extended_functionality", UnInt { bits: 1 }),
];

pub const ACCELEROMETER: &[FieldSpec] = &[
    ("sens_ref", ConRelRes { bits: 16, start: 5e-7, tolerance: 0.00015 }),
    ("tf_hp_s", ConRelRes { bits: 8, start: 0.005, tolerance: 0.03 }),
];

pub const ACCELEROMETER_EXTENDED: &[FieldSpec] = &[
    ("passive", Constant("0")),
    ("passive_ctrl_function_mask", Constant("0b11")),
    ("passive_read_write", Constant("3")),
    ("passive_function_type", Constant("0")),
    ("passive_function", Constant("xx,00")),
    ("sens_initialize", Constant("0")),
    ("sens_ctrl_function_mask", Constant("0")),
    ("sens_read_write", Constant("3")),
    ("sens_function_type", Constant("1")),
    ("sens_function_10", Constant("10")),
    ("sens_function_01", Constant("10")),
    ("default_fr", UnInt { bits: 2 }),
    ("multiplexer_capable", UnInt { bits: 1 }),
    ("sens_ref_01", ConRelRes { bits: 16, start: 5e-7, tolerance: 1.0 }),
    ("sens_ref_10", ConRelRes { bits: 16, start: 5e-7, tolerance: 1.0 }),
    ("tf_hp_s_01", ConRelRes { bits: 8, start: 0.005, tolerance: 1.0 }),
    ("tf_hp_s_10", ConRelRes { bits: 8, start: 0.005, tolerance: 1.0 }),
];

pub const ACCEL_FORCE_COMMON: &[FieldSpec] = &[
    ("direction", UnInt { bits: 2 }),
    ("transducer_weight", ConRelRes { bits: 6, start: 0.1, tolerance: 0.1 }),
    ("elec_sig_type", Constant("Voltage Sensor")),
    ("map_method", Constant("Linear")),
    ("ac_dc_coupling", Constant("AC")),
    ("sign", UnInt { bits: 1 }),
    ("transfer_function", UnInt { bits: 1 }),
];

pub const TRANSFER_FUNCTION: &[FieldSpec] = &[
    ("tf_sp", ConRelRes { bits: 7, start: 10.0, tolerance: 0.05 }),
    ("tf_kpr", ConRelRes { bits: 9, start: 100.0, tolerance: 0.01 }),
    ("tf_kpq", ConRelRes { bits: 9, start: 0.4, tolerance: 0.01 }),
    ("tf_sl", ConRes { bits: 7, start: -6.3, step: 0.1 }),
    ("temp_coef", ConRes { bits: 6, start: -0.8, step: 0.025 }),
];

pub const ACCEL_FORCE_REFERENCE: &[FieldSpec] = &[
    ("ref_freq", ConRelRes { bits: 8, start: 0.35, tolerance: 0.0175 }),
    ("ref_temp", ConRes { bits: 5, start: 15.0, step: 0.5 }),
];

pub const THERMOCOUPLE: &[FieldSpec] = &[
    ("elec_sig_type", Constant("Voltage Sensor")),
    ("minimum_temperature", ConRes { bits: 11, start: -273.0, step: 1.0 }),
    ("maximum_temperature", ConRes { bits: 11, start: -273.0, step: 1.0 }),
    ("minimum_electrical_output", ConRes { bits: 7, start: -0.025, step: 0.001 }),
    ("maximum_electrical_output", ConRes { bits: 7, start: -0.025, step: 0.001 }),
    ("mapping_method", Constant("Voltage Sensor")),
    ("thermocouple_type", UnInt { bits: 4 }),
    ("cjc_required_or_compensated", UnInt { bits: 1 }),
    ("thermocouple_resistance", ConRelRes { bits: 12, start: 1.0, tolerance: 1.0 }),
    ("sensor_response_time", ConRelRes { bits: 6, start: 1e-6, tolerance: 1.0 }),
];

pub const CALIBRATION: &[FieldSpec] = &[
    ("calibration_date", Date { bits: 16 }),
    ("calibration_initials", Chr5 { bits: 15 }),
    ("calibration_period", UnInt { bits: 12 }),
    ("measurement_location_id", UnInt { bits: 11 }),
    ("end_selector", UnInt { bits: 2 }),
    ("extended_end_selector", UnInt { bits: 1 }),
    ("user_data", Ascii),
];
