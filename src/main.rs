use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;
use mockcloud::azure::{self, ComputeManagementClient, VirtualMachine};
use mockcloud::config::EmulatorConfig;
use mockcloud::google::{self, ComputeClient};
use mockcloud::mock::fresh_cloud;
use mockcloud::oracle::{self, LaunchInstanceDetails, ListInstancesOptions, SortBy, SortOrder};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Run one compute API call against a freshly seeded virtual cloud
#[derive(Parser, Debug)]
#[command(name = "mockcloud", version, about, long_about = None)]
struct Args {
    /// Emulator config file (defaults to $MOCKCLOUD_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Google Compute Engine
    Google {
        #[command(subcommand)]
        command: GoogleCommand,
    },
    /// Azure compute
    Azure {
        #[command(subcommand)]
        command: AzureCommand,
    },
    /// OCI Core Services
    Oracle {
        #[command(subcommand)]
        command: OracleCommand,
    },
}

#[derive(Subcommand, Debug)]
enum GoogleCommand {
    /// List instances in a zone
    List {
        #[arg(long)]
        project: String,
        #[arg(long)]
        zone: String,
        /// gcloud-style filter expression
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        max_results: Option<u32>,
    },
    /// Insert an instance
    Insert {
        #[arg(long)]
        project: String,
        #[arg(long)]
        zone: String,
        #[arg(long)]
        name: String,
        /// Extra instance fields as a JSON object
        #[arg(long)]
        body: Option<String>,
    },
    /// Get an instance
    Get {
        #[arg(long)]
        project: String,
        #[arg(long)]
        zone: String,
        #[arg(long)]
        name: String,
    },
    /// List machine types
    MachineTypes {
        #[arg(long)]
        project: String,
        #[arg(long)]
        zone: String,
        #[arg(long)]
        filter: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AzureCommand {
    /// List virtual machines in a resource group
    List {
        #[arg(long)]
        subscription: String,
        #[arg(long)]
        resource_group: String,
    },
    /// Create a virtual machine
    Create {
        #[arg(long)]
        subscription: String,
        #[arg(long)]
        resource_group: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "eastus")]
        location: String,
        #[arg(long)]
        vm_size: Option<String>,
    },
    /// Get a virtual machine
    Get {
        #[arg(long)]
        subscription: String,
        #[arg(long)]
        resource_group: String,
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortKey {
    TimeCreated,
    DisplayName,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    Asc,
    Desc,
}

#[derive(Subcommand, Debug)]
enum OracleCommand {
    /// List instances in a compartment
    List {
        #[arg(long)]
        compartment: String,
        #[arg(long, value_enum)]
        sort_by: Option<SortKey>,
        #[arg(long, value_enum)]
        sort_order: Option<Order>,
    },
    /// Launch an instance
    Launch {
        #[arg(long)]
        compartment: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        availability_domain: Option<String>,
        #[arg(long)]
        shape: Option<String>,
    },
    /// Get an instance by OCID
    Get {
        #[arg(long)]
        instance_id: String,
    },
    /// List compute shapes
    Shapes {
        #[arg(long)]
        compartment: String,
    },
    /// List VNIC attachments in a compartment
    VnicAttachments {
        #[arg(long)]
        compartment: String,
        #[arg(long)]
        instance_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("mockcloud started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("mockcloud").join("mockcloud.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".mockcloud").join("mockcloud.log");
    }
    PathBuf::from("mockcloud.log")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_google(cloud: &mockcloud::VirtualCloud, command: GoogleCommand) -> Result<()> {
    let compute = ComputeClient::with_transport(google::emulator(cloud));

    let body = match command {
        GoogleCommand::List {
            project,
            zone,
            filter,
            max_results,
        } => {
            let mut request = compute.instances().list(&project, &zone);
            if let Some(filter) = filter.as_deref() {
                request = request.filter(filter);
            }
            if let Some(max_results) = max_results {
                request = request.max_results(max_results);
            }
            request.execute().await?
        },
        GoogleCommand::Insert {
            project,
            zone,
            name,
            body,
        } => {
            let mut body: Value = match body {
                Some(text) => serde_json::from_str(&text).context("--body must be a JSON object")?,
                None => Value::Object(Default::default()),
            };
            let fields = body
                .as_object_mut()
                .context("--body must be a JSON object")?;
            fields.insert("name".to_string(), Value::String(name));
            compute.instances().insert(&project, &zone, body).execute().await?
        },
        GoogleCommand::Get { project, zone, name } => {
            compute.instances().get(&project, &zone, &name).execute().await?
        },
        GoogleCommand::MachineTypes { project, zone, filter } => {
            let mut request = compute.machine_types().list(&project, &zone);
            if let Some(filter) = filter.as_deref() {
                request = request.filter(filter);
            }
            request.execute().await?
        },
    };

    print_json(&body)
}

async fn run_azure(cloud: &mockcloud::VirtualCloud, command: AzureCommand) -> Result<()> {
    match command {
        AzureCommand::List {
            subscription,
            resource_group,
        } => {
            let client =
                ComputeManagementClient::with_transport(&subscription, azure::emulator(cloud));
            let vms: Vec<VirtualMachine> = client
                .virtual_machines()
                .list(&resource_group)
                .try_collect()
                .await?;
            print_json(&vms)
        },
        AzureCommand::Create {
            subscription,
            resource_group,
            name,
            location,
            vm_size,
        } => {
            let client =
                ComputeManagementClient::with_transport(&subscription, azure::emulator(cloud));
            let mut parameters = VirtualMachine::new(&location);
            if let Some(vm_size) = vm_size.as_deref() {
                parameters = parameters.with_hardware_profile(vm_size);
            }
            let vm = client
                .virtual_machines()
                .begin_create_or_update(&resource_group, &name, parameters)
                .await?
                .result()
                .await?;
            print_json(&vm)
        },
        AzureCommand::Get {
            subscription,
            resource_group,
            name,
        } => {
            let client =
                ComputeManagementClient::with_transport(&subscription, azure::emulator(cloud));
            let vm = client.virtual_machines().get(&resource_group, &name).await?;
            print_json(&vm)
        },
    }
}

async fn run_oracle(cloud: &mockcloud::VirtualCloud, command: OracleCommand) -> Result<()> {
    let compute = oracle::ComputeClient::with_transport(oracle::emulator(cloud));

    match command {
        OracleCommand::List {
            compartment,
            sort_by,
            sort_order,
        } => {
            let options = ListInstancesOptions {
                sort_by: sort_by.map(|key| match key {
                    SortKey::TimeCreated => SortBy::TimeCreated,
                    SortKey::DisplayName => SortBy::DisplayName,
                }),
                sort_order: sort_order.map(|order| match order {
                    Order::Asc => SortOrder::Asc,
                    Order::Desc => SortOrder::Desc,
                }),
                ..ListInstancesOptions::default()
            };
            let instances = compute.list_all_instances(&compartment, &options).await?;
            print_json(&instances)
        },
        OracleCommand::Launch {
            compartment,
            display_name,
            availability_domain,
            shape,
        } => {
            let mut details = LaunchInstanceDetails::new(&compartment);
            details.display_name = display_name;
            details.availability_domain = availability_domain;
            details.shape = shape;
            let response = compute.launch_instance(&details).await?;
            print_json(&response.data)
        },
        OracleCommand::Get { instance_id } => {
            let response = compute.get_instance(&instance_id).await?;
            print_json(&response.data)
        },
        OracleCommand::Shapes { compartment } => {
            let response = compute.list_shapes(&compartment).await?;
            print_json(&response.data)
        },
        OracleCommand::VnicAttachments {
            compartment,
            instance_id,
        } => {
            let response = compute
                .list_vnic_attachments(&compartment, instance_id.as_deref())
                .await?;
            print_json(&response.data)
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let config =
        EmulatorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let cloud = fresh_cloud(config).context("Failed to build the virtual cloud")?;

    match args.command {
        Command::Google { command } => run_google(&cloud, command).await,
        Command::Azure { command } => run_azure(&cloud, command).await,
        Command::Oracle { command } => run_oracle(&cloud, command).await,
    }
}
