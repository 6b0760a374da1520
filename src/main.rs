use std::{
  cmp::max,
  fs::{self, File},
  io,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use simplelog::{
  ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
  TerminalMode, WriteLogger,
};

use wfg_regmap::{
  console, svd, wfg, Interconnect, Mcp9808Emulation, MemoryTransport, Platform, RegisterKind,
  RegisterSession,
};

/// Inspect the WFG register map and exercise it against a simulated register file.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Cli {
  #[clap(flatten)]
  global_opts: GlobalOpts,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Clone, Debug, Args)]
struct GlobalOpts {
  /// Load the register table from this file instead of the built-in WFG table. Files ending in
  /// `.svd` are imported as CMSIS-SVD, anything else as a JSON table.
  #[arg(global = true, long)]
  table: Option<PathBuf>,

  /// Enable debug mode. Every register access is logged.
  #[arg(global = true, long, default_value_t = false)]
  debug: bool,

  /// Set the log level for the application.
  ///
  /// If `debug` is enabled, the minimum log level will be set to `Debug`.
  #[arg(global = true, long, default_value_t = LevelFilter::Info)]
  log_level: LevelFilter,

  /// Disable colored output in the logs.
  #[arg(global = true, long, default_value_t = false)]
  no_colors: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
  /// List the modules, or the registers of one module.
  List { module: Option<String> },

  /// Print the address and bit range of a register or field.
  Resolve {
    module: String,
    register: String,
    field: Option<String>,
  },

  /// List the selectors of a consumer module and the producers each can route.
  Routes { consumer: String },

  /// Emulate an MCP9808 temperature sensor on the I2C target.
  #[command(name = "emulate-mcp9808")]
  EmulateMcp9808(EmulateArgs),
}

#[derive(Args, Debug, Clone)]
struct EmulateArgs {
  /// Initial ambient temperature.
  #[arg(long, default_value_t = 30)]
  temperature: u32,

  /// I2C address of the emulated sensor.
  #[arg(long, default_value = "0x18", value_parser = parse_number)]
  address: u32,

  /// Content of the device ID register.
  #[arg(long, default_value = "0x37", value_parser = parse_number)]
  device_id: u32,

  /// Directory for the session log file.
  #[arg(long, default_value = "./mcp9808_emulation.logs")]
  log_dir: PathBuf,
}

fn parse_number(s: &str) -> Result<u32, String> {
  let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
    Some(hex) => u32::from_str_radix(hex, 16),
    None => s.parse::<u32>(),
  };
  parsed.map_err(|e| format!("'{}' is not a number: {}", s, e))
}

fn init_logging(opts: &GlobalOpts, log_file: Option<File>) -> Result<()> {
  let log_level = if opts.debug {
    max(LevelFilter::Debug, opts.log_level)
  } else {
    opts.log_level
  };

  let mut config_builder = ConfigBuilder::new();
  if opts.debug {
    config_builder.set_time_level(LevelFilter::Error);
    config_builder.set_target_level(LevelFilter::Error);
    config_builder.set_location_level(LevelFilter::Error);
  } else {
    config_builder.set_time_level(LevelFilter::Off);
    config_builder.set_target_level(LevelFilter::Off);
    config_builder.set_location_level(LevelFilter::Off);
  }
  config_builder.set_thread_level(LevelFilter::Off);

  let color_choice = if opts.no_colors {
    ColorChoice::Never
  } else {
    ColorChoice::Auto
  };

  let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
    log_level,
    config_builder.build(),
    TerminalMode::Mixed,
    color_choice,
  )];
  if let Some(file) = log_file {
    loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
  }

  CombinedLogger::init(loggers)?;
  Ok(())
}

fn open_log_file(dir: &Path) -> Result<File> {
  fs::create_dir_all(dir).with_context(|| format!("Cannot create log directory {:?}", dir))?;
  let name = format!(
    "Sensor_emulation_{}.log",
    chrono::Local::now().format("%Y.%m.%d_%H.%M.%S")
  );
  let path = dir.join(name);
  File::create(&path).with_context(|| format!("Cannot create log file {:?}", path))
}

fn load_table(path: &Path) -> Result<Platform> {
  let text = fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))?;
  let platform = match path.extension().and_then(|e| e.to_str()) {
    Some(ext) if ext.eq_ignore_ascii_case("svd") => Platform::from_map(svd::map_from_svd(&text)?),
    _ => Platform::from_json(&text)?,
  };
  info!("Loaded table {:?}", path);
  Ok(platform)
}

fn list(platform: &Platform, module: Option<&str>) -> Result<()> {
  let module = match module {
    Some(m) => platform.map.module(m)?,
    None => {
      for m in platform.map.modules() {
        println!(
          "{:<24} {:#07x} {:>3} registers",
          m.name,
          m.base_address().unwrap_or(0),
          m.registers.len()
        );
      }
      return Ok(());
    }
  };

  for r in module.registers.iter() {
    println!("{:<32} {:#07x} {:?}", r.name, r.address, r.access);
    match r.kind {
      RegisterKind::Fields(ref fields) => {
        for f in fields.iter() {
          let name = if f.is_reserved() { "(reserved)" } else { f.name.as_str() };
          println!("    {:<28} [{}:{}]", name, f.msb(), f.lsb());
        }
      }
      RegisterKind::Enumerants(ref sel) => {
        for (label, value) in sel.choices() {
          println!("    {:<28} {:#04x}", label, value);
        }
      }
    }
  }
  Ok(())
}

fn resolve(platform: &Platform, module: &str, register: &str, field: Option<&str>) -> Result<()> {
  let loc = platform.map.resolve(module, register, field)?;
  println!(
    "address {:#07x} msb {} lsb {} mask {:#010x}",
    loc.address,
    loc.msb(),
    loc.lsb(),
    loc.mask()
  );
  Ok(())
}

fn routes(platform: &Platform, consumer: &str) -> Result<()> {
  let interconnect = Interconnect::new(&platform.map)?;
  let selectors: Vec<String> = interconnect
    .consumers()?
    .into_iter()
    .filter(|(c, _)| c == consumer)
    .map(|(_, s)| s)
    .collect();

  if selectors.is_empty() {
    anyhow::bail!("{} has no selector registers", consumer);
  }

  for selector in selectors.iter() {
    let spec = interconnect.selector(consumer, selector)?;
    println!("{}_{}", consumer, selector);
    for (label, value) in spec.choices() {
      println!("    {:<28} {:#04x}", label, value);
    }
  }
  Ok(())
}

fn emulate(platform: &Platform, args: &EmulateArgs) -> Result<()> {
  let emulation = Mcp9808Emulation {
    address: args.address,
    device_id: args.device_id,
    ..Mcp9808Emulation::default()
  };
  let mut session = RegisterSession::new(&platform.map, MemoryTransport::new());
  info!("Connected to simulated register file");

  info!("Configure the I2C target for the MCP9808 temperature sensor emulation");
  emulation.configure(&mut session)?;

  info!("Route the I2C target SCL and SDA lines to the physical pins");
  emulation.route_pins(&mut session, &platform.output_pins, &platform.input_pins)?;

  emulation.set_ambient_temperature(&mut session, args.temperature)?;
  info!("Ambient temperature is {}", args.temperature);

  let stdin = io::stdin();
  console::run(&mut session, &emulation, stdin.lock(), io::stdout())?;

  debug!(
    "Session issued {} register accesses",
    session.transport().accesses().len()
  );
  Ok(())
}

fn main() -> Result<()> {
  let args = Cli::parse();
  let global_opts = &args.global_opts;

  let log_file = match args.command {
    Commands::EmulateMcp9808(ref e) => Some(open_log_file(&e.log_dir)?),
    _ => None,
  };
  init_logging(global_opts, log_file)?;
  debug!("Parsed arguments: {:?}", args);

  let loaded;
  let platform = match global_opts.table {
    Some(ref path) => {
      loaded = load_table(path)?;
      &loaded
    }
    None => wfg()?,
  };

  match args.command {
    Commands::List { ref module } => list(platform, module.as_deref()),
    Commands::Resolve {
      ref module,
      ref register,
      ref field,
    } => resolve(platform, module, register, field.as_deref()),
    Commands::Routes { ref consumer } => routes(platform, consumer),
    Commands::EmulateMcp9808(ref e) => emulate(platform, e),
  }
}
