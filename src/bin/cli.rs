use clap::{App, Arg, ArgMatches, SubCommand};
use std::{fs, path::Path};
use valuepack::{
    error::PackError, HoleOrder, LayoutPlanner, MappedRegion, PackedRecord, PlannerConfig,
    RecordSchema, RegionConfig, Result, SchemaDef,
};

fn main() -> Result<()> {
    env_logger::init();

    let schema_arg = Arg::with_name("schema")
        .short("s")
        .long("schema")
        .value_name("FILE")
        .help("Schema definition (JSON)")
        .required(true)
        .takes_value(true);
    let file_arg = Arg::with_name("file")
        .short("f")
        .long("file")
        .value_name("FILE")
        .help("Region file")
        .required(true)
        .takes_value(true);

    let matches = App::new("valuepack-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Packed record layout and inspection tool")
        .subcommand(
            SubCommand::with_name("plan")
                .about("Plan a schema and print its layout")
                .arg(schema_arg.clone())
                .arg(
                    Arg::with_name("hole_order")
                        .long("hole-order")
                        .value_name("ORDER")
                        .help("Hole selection order")
                        .possible_values(&["smallest", "largest", "lowest"])
                        .default_value("smallest")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("Print the layout report as JSON"),
                ),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("Create a zeroed file-backed region sized for a number of records")
                .arg(schema_arg.clone())
                .arg(file_arg.clone())
                .arg(
                    Arg::with_name("count")
                        .short("c")
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of records")
                        .default_value("1")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Print records stored in a file-backed region")
                .arg(schema_arg)
                .arg(file_arg)
                .arg(
                    Arg::with_name("first")
                        .short("f")
                        .long("first")
                        .value_name("INDEX")
                        .help("Index of the first record")
                        .default_value("0")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("count")
                        .short("c")
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of consecutive records")
                        .default_value("1")
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("info").about("Show version information"))
        .get_matches();

    match matches.subcommand() {
        ("plan", Some(plan_matches)) => handle_plan(plan_matches),
        ("create", Some(create_matches)) => handle_create(create_matches),
        ("dump", Some(dump_matches)) => handle_dump(dump_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| PackError::invalid_parameter(name, "Missing value"))
}

fn parse_number(matches: &ArgMatches, name: &str) -> Result<usize> {
    required(matches, name)?
        .parse()
        .map_err(|_| PackError::invalid_parameter(name, "Invalid number"))
}

fn load_schema(path: &str) -> Result<SchemaDef> {
    let text = fs::read_to_string(Path::new(path))
        .map_err(|e| PackError::from_io(e, "Failed to read schema file"))?;
    SchemaDef::from_json(&text)
}

fn handle_plan(matches: &ArgMatches) -> Result<()> {
    let def = load_schema(required(matches, "schema")?)?;
    let hole_order = match required(matches, "hole_order")? {
        "largest" => HoleOrder::LargestFirst,
        "lowest" => HoleOrder::LowestOffset,
        _ => HoleOrder::SmallestFirst,
    };
    let planner = LayoutPlanner::new(PlannerConfig::default().with_hole_order(hole_order))?;
    let schema = planner.plan(&def)?;

    if matches.is_present("json") {
        println!("{}", serde_json::to_string_pretty(&schema.layout_report())?);
    } else {
        print!("{}", schema);
    }
    Ok(())
}

fn handle_create(matches: &ArgMatches) -> Result<()> {
    let schema = RecordSchema::plan(&load_schema(required(matches, "schema")?)?)?;
    let path = required(matches, "file")?;
    let count = parse_number(matches, "count")?;

    let config = RegionConfig::for_records(&schema, count).with_file(path);
    let region = MappedRegion::new(config)?;
    region.flush()?;
    println!(
        "Created region '{}' with room for {} {} records ({} bytes, stride {})",
        region.name(),
        region.record_capacity(),
        schema.name(),
        region.size(),
        region.record_stride()
    );
    Ok(())
}

fn handle_dump(matches: &ArgMatches) -> Result<()> {
    let schema = RecordSchema::plan(&load_schema(required(matches, "schema")?)?)?;
    let first = parse_number(matches, "first")?;
    let count = parse_number(matches, "count")?;

    let config = RegionConfig::open(&schema).with_file(required(matches, "file")?);
    let region = MappedRegion::new(config)?;

    for index in first..first.saturating_add(count) {
        let record = PackedRecord::at_index(&region, index, schema.clone())?;
        println!("[{}] {}", index, record);
    }
    Ok(())
}

fn show_info() -> Result<()> {
    println!("Valuepack v{}", valuepack::VERSION);
    println!("Platform: {}", std::env::consts::OS);
    println!("Architecture: {}", std::env::consts::ARCH);
    println!("Memfd regions: {}", cfg!(target_os = "linux"));
    Ok(())
}
