// THEORY:
// The visualizer turns an `ExposureReport` into artifacts a player can look at:
// a Gantt-style timeline PNG, a plain-text tactical report, a JSON export for
// further tooling, and the PNG snapshots taken whenever a new target appears.
// None of this feeds back into the engine; it only reads the report.

pub mod export;
pub mod snapshot;
pub mod table;
pub mod timeline;

pub use export::{to_json_string, write_json, ExportDocument};
pub use snapshot::{save_png, snapshot_file_name, snapshot_path};
pub use table::ReportTable;
pub use timeline::{class_color, render_timeline, save_timeline, TimelineLayout};
