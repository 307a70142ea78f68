use std::{fs, path::Path};

use geo::{LineString, MultiPolygon, Polygon};
use polars::prelude::*;
use shapefile::{dbase::{FieldName, FieldValue, Record, TableWriterBuilder}, Point, PolygonRing};

use gridagg::{geom::{Crs, Geometries}, run, AggregationError, RunConfig};

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

const LAEA_PRJ: &str = r#"PROJCS["ETRS_1989_LAEA",GEOGCS["GCS_ETRS_1989",DATUM["D_ETRS_1989",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Azimuthal_Equal_Area"],PARAMETER["False_Easting",4321000.0],PARAMETER["False_Northing",3210000.0],PARAMETER["Central_Meridian",10.0],PARAMETER["Latitude_Of_Origin",52.0],UNIT["Meter",1.0]]"#;

const REGIONS: [(&str, [f64; 4]); 3] = [
    ("DE11", [9.0, 49.0, 10.0, 51.0]),
    ("DE12", [10.0, 49.0, 11.0, 51.0]),
    ("FR10", [2.0, 48.0, 3.0, 49.0]),
];

/// Two cells on either side of lon 10, two years.
const MODEL_OUTPUT: &str = "\
    Lon    Lat  Year      X      Y
   9.75  50.25  2000  100.0    1.0
  10.25  50.25  2000  200.0    2.0
   9.75  50.25  2001  200.0     NA
  10.25  50.25  2001  400.0    4.0
";

/// Clockwise closed ring of a lon/lat box.
fn box_ring([x0, y0, x1, y1]: [f64; 4]) -> Vec<(f64, f64)> {
    vec![(x0, y0), (x0, y1), (x1, y1), (x1, y0), (x0, y0)]
}

fn write_rings(path: &Path, prj: &str, regions: &[(&str, Vec<(f64, f64)>)]) {
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("NUTS_ID").unwrap(), 10);
    let mut writer = shapefile::Writer::from_path(path, table).unwrap();

    for (id, ring) in regions {
        let polygon = shapefile::Polygon::new(PolygonRing::Outer(
            ring.iter().map(|&(x, y)| Point { x, y }).collect(),
        ));
        let mut record = Record::default();
        record.insert("NUTS_ID".to_string(), FieldValue::Character(Some(id.to_string())));
        writer.write_shape_and_record(&polygon, &record).unwrap();
    }
    fs::write(path.with_extension("prj"), prj).unwrap();
}

fn write_boundaries(path: &Path, regions: &[(&str, [f64; 4])]) {
    let rings = regions.iter().map(|&(id, bounds)| (id, box_ring(bounds))).collect::<Vec<_>>();
    write_rings(path, WGS84_PRJ, &rings);
}

/// The same regions, with their corners projected to EPSG:3035.
fn write_projected_boundaries(path: &Path, regions: &[(&str, [f64; 4])]) {
    let shapes = regions.iter()
        .map(|&(_, bounds)| MultiPolygon(vec![Polygon::new(LineString::from(box_ring(bounds)), vec![])]))
        .collect();
    let projected = Geometries::new(shapes, Crs::Wgs84).to_equal_area().unwrap();

    let rings = regions.iter().zip(projected.shapes())
        .map(|(&(id, _), shape)| (id, shape.0[0].exterior().coords().map(|c| (c.x, c.y)).collect()))
        .collect::<Vec<_>>();
    write_rings(path, LAEA_PRJ, &rings);
}

fn setup(dir: &Path) -> RunConfig {
    let input = dir.join("cpool.out");
    fs::write(&input, MODEL_OUTPUT).unwrap();

    let boundaries = dir.join("nuts.shp");
    write_boundaries(&boundaries, &REGIONS);

    RunConfig::new(input, boundaries, dir.join("out"))
}

fn read_standard(path: &Path) -> DataFrame {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .unwrap()
        .finish()
        .unwrap()
}

fn read_excel(path: &Path) -> DataFrame {
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|options| options.with_separator(b';').with_decimal_comma(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .unwrap()
        .finish()
        .unwrap()
}

fn floats(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    df.column(column).unwrap().cast(&DataType::Float64).unwrap().f64().unwrap().into_iter().collect()
}

fn strings(df: &DataFrame, column: &str) -> Vec<String> {
    df.column(column).unwrap().str().unwrap().into_no_null_iter().map(String::from).collect()
}

fn close(a: Option<f64>, b: f64) -> bool { a.is_some_and(|a| (a - b).abs() < 1e-6 * b.abs().max(1.0)) }

#[test]
fn writes_four_tables_in_two_locales() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let out = dir.path().join("out");

    let report = run(&config).unwrap();
    assert_eq!(report.rows, 4);
    assert_eq!(report.locations, 2);
    assert_eq!(report.regions, 3);
    assert_eq!(report.coercion.get("Y").non_numeric, 1);
    assert_eq!(report.outputs.len(), 8);

    for stem in ["region_weighted_avgs", "country_weighted_avgs", "region_weighted_sums", "country_weighted_sums"] {
        assert!(out.join("csv").join(format!("{stem}_cpool.csv")).is_file());
        assert!(out.join("excel").join(format!("{stem}_cpool_excel.csv")).is_file());
    }
    assert!(!out.join("cells").exists());
}

#[test]
fn region_and_country_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    run(&config).unwrap();
    let csv = dir.path().join("out").join("csv");

    let sums = read_standard(&csv.join("region_weighted_sums_cpool.csv"));
    assert_eq!(strings(&sums, "NUTS_ID"), vec!["DE11", "DE11", "DE12", "DE12"]);
    let x = floats(&sums, "weighted_sum_X");
    assert!(close(x[0], 100.0) && close(x[1], 200.0) && close(x[2], 200.0) && close(x[3], 400.0));

    let countries = read_standard(&csv.join("country_weighted_sums_cpool.csv"));
    assert_eq!(strings(&countries, "Country"), vec!["DE", "DE"]);
    let x = floats(&countries, "weighted_sum_X");
    assert!(close(x[0], 300.0) && close(x[1], 600.0));

    let avgs = read_standard(&csv.join("country_weighted_avgs_cpool.csv"));
    let x = floats(&avgs, "weighted_avg_X");
    assert!(close(x[0], 150.0) && close(x[1], 300.0));

    // Y is missing for one cell in 2001; its weight still counts.
    let y = floats(&avgs, "weighted_avg_Y");
    assert!(close(y[1], 2.0));
}

#[test]
fn drop_record_policy_ignores_missing_weight() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig { missing_policy: gridagg::MissingPolicy::DropRecord, ..setup(dir.path()) };
    run(&config).unwrap();

    let avgs = read_standard(&dir.path().join("out").join("csv").join("country_weighted_avgs_cpool.csv"));
    assert!(close(floats(&avgs, "weighted_avg_Y")[1], 4.0));
}

#[test]
fn locales_are_numerically_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig { dump_cells: true, ..setup(dir.path()) };
    run(&config).unwrap();
    let out = dir.path().join("out");

    for (standard, excel) in [
        (out.join("csv").join("region_weighted_avgs_cpool.csv"), out.join("excel").join("region_weighted_avgs_cpool_excel.csv")),
        (out.join("csv").join("country_weighted_sums_cpool.csv"), out.join("excel").join("country_weighted_sums_cpool_excel.csv")),
        (out.join("cells").join("cpool_cells.csv"), out.join("cells").join("cpool_cells_excel.csv")),
    ] {
        let a = read_standard(&standard);
        let b = read_excel(&excel);
        assert_eq!(a.get_column_names(), b.get_column_names());
        for name in a.get_column_names() {
            if a.column(name).unwrap().dtype() == &DataType::String { continue }
            assert_eq!(floats(&a, name), floats(&b, name), "column {name} of {}", standard.display());
        }
    }
}

#[test]
fn cell_dump_reports_area_and_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig { dump_cells: true, ..setup(dir.path()) };
    run(&config).unwrap();

    let cells = read_standard(&dir.path().join("out").join("cells").join("cpool_cells.csv"));
    assert_eq!(cells.height(), 2);
    for area in floats(&cells, "area_km2") {
        // A 0.5 degree cell at 50N is roughly 35 km by 55 km.
        assert!(area.is_some_and(|a| a > 1500.0 && a < 2500.0));
    }
    for coverage in floats(&cells, "coverage") {
        assert!(close(coverage, 1.0));
    }
}

#[test]
fn runs_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let first = run(&config).unwrap();
    let bytes = first.outputs.iter().map(|path| fs::read(path).unwrap()).collect::<Vec<_>>();

    let second = run(&config).unwrap();
    assert_eq!(first.outputs, second.outputs);
    for (path, before) in second.outputs.iter().zip(bytes) {
        assert_eq!(fs::read(path).unwrap(), before, "{} changed", path.display());
    }
}

#[test]
fn missing_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig { input: dir.path().join("absent.out"), ..setup(dir.path()) };

    let err = run(&config).unwrap_err();
    match err.downcast_ref::<AggregationError>() {
        Some(AggregationError::MissingInput { path }) => assert_eq!(path, &dir.path().join("absent.out")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!dir.path().join("out").exists());
}

#[test]
fn malformed_region_id_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path());
    config.boundaries = dir.path().join("bad.shp");
    write_boundaries(&config.boundaries, &[("D", [9.0, 49.0, 11.0, 51.0])]);

    let err = run(&config).unwrap_err();
    assert!(matches!(err.downcast_ref::<AggregationError>(), Some(AggregationError::MalformedKey(_))));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn csv_input_and_selected_variables() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path());
    let csv_input = dir.path().join("cpool.csv");
    gridagg::io::convert_out_to_csv(&config.input, &csv_input).unwrap();
    config.input = csv_input;
    config.variables = Some(vec!["X".to_string()]);
    config.name = Some("selected".to_string());

    run(&config).unwrap();
    let sums = read_standard(&dir.path().join("out").join("csv").join("region_weighted_sums_selected.csv"));
    let names = sums.get_column_names().into_iter().map(|n| n.to_string()).collect::<Vec<_>>();
    assert_eq!(names, vec!["NUTS_ID", "Year", "weighted_sum_X"]);
}

#[test]
fn projected_boundaries_match_geographic_ones() {
    let dir = tempfile::tempdir().unwrap();
    let geographic = setup(dir.path());
    let geographic_report = run(&geographic).unwrap();

    let laea = dir.path().join("nuts_laea.shp");
    write_projected_boundaries(&laea, &REGIONS);
    let projected = RunConfig { boundaries: laea, output_dir: dir.path().join("out_laea"), ..geographic.clone() };
    let projected_report = run(&projected).unwrap();
    assert_eq!(projected_report.pieces, geographic_report.pieces);
    assert_eq!(projected_report.unmatched_cells, 0);

    for table in ["region_weighted_sums_cpool.csv", "region_weighted_avgs_cpool.csv", "country_weighted_sums_cpool.csv"] {
        let a = read_standard(&geographic.output_dir.join("csv").join(table));
        let b = read_standard(&projected.output_dir.join("csv").join(table));
        assert_eq!(a.get_column_names(), b.get_column_names());
        for name in a.get_column_names() {
            if a.column(name).unwrap().dtype() == &DataType::String {
                assert_eq!(strings(&a, name), strings(&b, name));
                continue
            }
            for (x, y) in floats(&a, name).into_iter().zip(floats(&b, name)) {
                assert_eq!(x.is_some(), y.is_some(), "{table} {name}");
                if let (Some(x), Some(y)) = (x, y) {
                    assert!(close(Some(x), y), "{table} {name}: {x} vs {y}");
                }
            }
        }
    }
}

#[test]
fn degrees_under_projected_tag_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path());
    config.boundaries = dir.path().join("mistagged.shp");
    let rings = REGIONS.iter().map(|&(id, bounds)| (id, box_ring(bounds))).collect::<Vec<_>>();
    write_rings(&config.boundaries, LAEA_PRJ, &rings);

    let err = run(&config).unwrap_err();
    assert!(matches!(err.downcast_ref::<AggregationError>(), Some(AggregationError::InvalidGeometry(_))), "{err:#}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn etrs89_grid_source() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig { source_crs: Crs::Etrs89, ..setup(dir.path()) };
    let report = run(&config).unwrap();
    assert_eq!(report.unmatched_cells, 0);

    let sums = read_standard(&dir.path().join("out").join("csv").join("region_weighted_sums_cpool.csv"));
    assert_eq!(strings(&sums, "NUTS_ID"), vec!["DE11", "DE11", "DE12", "DE12"]);
    let x = floats(&sums, "weighted_sum_X");
    assert!(close(x[0], 100.0) && close(x[1], 200.0) && close(x[2], 200.0) && close(x[3], 400.0));
}
