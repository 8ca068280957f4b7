use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sql_ez::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run queries and stream result sets as JSON lines")]
struct Args {
    /// Use the SQLite database at this path instead of Postgres
    #[arg(long, global = true)]
    sqlite: Option<PathBuf>,
    #[arg(long, env = "PGHOST", global = true)]
    host: Option<String>,
    #[arg(long, env = "PGPORT", global = true)]
    port: Option<u16>,
    #[arg(long, env = "PGUSER", global = true)]
    user: Option<String>,
    #[arg(long, env = "PGPASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
    #[arg(long, env = "PGDATABASE", global = true)]
    dbname: Option<String>,
    /// TLS negotiation for Postgres
    #[arg(long, env = "PGSSLMODE", value_enum, global = true)]
    sslmode: Option<SslMode>,
    /// PEM file of trusted root certificates
    #[arg(long, env = "PGSSLROOTCERT", global = true)]
    sslrootcert: Option<String>,
    #[arg(long, global = true)]
    pool_size: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a query and print every row as a JSON object
    Exec {
        sql: String,
        /// Positional parameter; repeat for $2, $3, ...
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Stream a query through the pipeline to stdout
    Stream {
        sql: String,
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
        /// Emit each row as a JSON array instead of an object
        #[arg(long)]
        array: bool,
    },
}

impl Args {
    fn connection_config(&self) -> ConnectionConfig {
        match &self.sqlite {
            Some(path) => ConnectionConfig::Sqlite(SqliteOptions {
                db_path: path.to_string_lossy().into_owned(),
                pool_size: self.pool_size,
            }),
            None => ConnectionConfig::Postgres(PostgresOptions {
                url: None,
                host: self.host.clone(),
                port: self.port,
                user: self.user.clone(),
                password: self.password.clone(),
                dbname: self.dbname.clone(),
                pool_size: self.pool_size,
                ssl: self.sslmode,
                ssl_root_cert: self.sslrootcert.clone(),
            }),
        }
    }
}

fn parse_params(raw: &[String]) -> Vec<RowValues> {
    raw.iter().map(|p| RowValues::parse_literal(p)).collect()
}

async fn run(args: Args) -> Result<(), SqlEzError> {
    let db = SqlEz::connect(args.connection_config()).await?;

    match args.command {
        Command::Exec { sql, params } => {
            let result = db.exec_params(sql, parse_params(&params)).await?;
            if result.get_column_names().is_none_or(|names| names.is_empty()) {
                eprintln!("{} row(s) affected", result.rows_affected);
                return Ok(());
            }
            for row in result.rows() {
                let json = row
                    .to_json()
                    .map_err(|e| SqlEzError::Other(format!("json encode error: {e}")))?;
                println!("{json}");
            }
        }
        Command::Stream { sql, params, array } => {
            let mut request = QueryRequest::build(sql, Some(parse_params(&params)));
            if array {
                request = request.array_rows();
            }
            db.stream(request)
                .declare(JsonLines)
                .attach(WriterSink::new(tokio::io::stdout()))
                .await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
