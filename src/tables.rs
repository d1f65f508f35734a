use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use solis_control::{
    api::solis::InverterRecord,
    coordinator::Snapshot,
    core::{
        charge_discharge::{ChargeDischargeSettings, Slot},
        inverter::{ChargeDischarge, Inverter},
        storage_mode::StorageMode,
    },
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

fn optional_cell(value: Option<impl ToString>) -> Cell {
    value.map_or_else(|| Cell::new("n/a").add_attribute(Attribute::Dim), Cell::new)
}

pub fn build_snapshot_table(snapshot: &Snapshot) -> Table {
    let mut table = new_table();
    table.set_header(vec!["CID", "Value"]);
    for (cid, value) in snapshot.iter() {
        table.add_row(vec![Cell::new(cid).set_alignment(CellAlignment::Right), optional_cell(value)]);
    }
    table
}

pub fn build_inverter_list_table(records: &[InverterRecord]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Serial number", "Station", "Model", "Machine", "State"]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.serial_number),
            optional_cell(record.station_name.as_deref()),
            optional_cell(record.model.as_deref()),
            optional_cell(record.machine.as_deref()),
            match record.state.as_deref() {
                Some("1") => Cell::new("online").fg(Color::Green),
                Some(state) => Cell::new(state).fg(Color::Red),
                None => optional_cell(None::<&str>),
            },
        ]);
    }
    table
}

pub fn build_inverter_table(inverter: &Inverter) -> Table {
    let details = &inverter.info.details;
    let mut table = new_table();
    table.set_header(vec!["Property", "Value"]);
    table.add_row(vec![Cell::new("Serial number"), Cell::new(&inverter.info.serial_number)]);
    for (name, value) in [
        ("Model", &details.model),
        ("Version", &details.version),
        ("Machine", &details.machine),
        ("Energy storage control", &details.energy_storage_control),
        ("Parallel number", &details.parallel_number),
        ("Parallel battery", &details.parallel_battery),
    ] {
        table.add_row(vec![Cell::new(name), optional_cell(value.as_deref())]);
    }
    let power = details.power.as_ref().map(|power| format!("{power} {}", details.power_unit.as_deref().unwrap_or("")));
    table.add_row(vec![Cell::new("Power"), optional_cell(power.as_deref().map(str::trim_end))]);
    table.add_row(vec![
        Cell::new("Type"),
        if inverter.info.is_string_inverter() {
            Cell::new("string")
        } else {
            Cell::new("hybrid").fg(Color::Green)
        },
    ]);
    table.add_row(vec![
        Cell::new("Charge/discharge"),
        match inverter.charge_discharge {
            Some(ChargeDischarge::Settings(cid)) => Cell::new(format!("settings register {cid}")),
            Some(ChargeDischarge::Slots { .. }) => Cell::new("TOU v2 slots").fg(Color::Green),
            None => optional_cell(None::<&str>),
        },
    ]);
    table.add_row(vec![Cell::new("Registers"), Cell::new(inverter.all_cids().len())]);
    table
}

pub fn build_storage_mode_table(storage_mode: StorageMode) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec![Cell::new("Raw"), Cell::new(storage_mode)]);
    table.add_row(vec![
        Cell::new("Mode"),
        storage_mode.mode().map_or_else(|| Cell::new("ambiguous").fg(Color::Red), Cell::new),
    ]);
    for (name, is_enabled) in [
        ("Battery reserve", storage_mode.is_battery_reserve_enabled()),
        ("Grid charging", storage_mode.is_grid_charging_allowed()),
        ("Time of use", storage_mode.is_time_of_use_enabled()),
    ] {
        table.add_row(vec![
            Cell::new(name),
            if is_enabled { Cell::new("on").fg(Color::Green) } else { Cell::new("off").add_attribute(Attribute::Dim) },
        ]);
    }
    table
}

pub fn build_charge_discharge_table(settings: &ChargeDischargeSettings) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Slot", "Charge current", "Charge time", "Discharge current", "Discharge time"]);
    for slot in Slot::all() {
        table.add_row(vec![
            Cell::new(slot),
            optional_cell(settings.charge_current(slot)).set_alignment(CellAlignment::Right).fg(Color::Green),
            optional_cell(settings.charge_time_slot(slot)),
            optional_cell(settings.discharge_current(slot)).set_alignment(CellAlignment::Right).fg(Color::Red),
            optional_cell(settings.discharge_time_slot(slot)),
        ]);
    }
    table
}
