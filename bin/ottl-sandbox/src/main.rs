//! Sandbox for poking at the statement front end from the command line.
//!
//! Registers a toy log-record context and runs a handful of statements
//! against it, printing the record as it mutates.

use std::collections::HashMap;
use std::sync::Arc;

use ottl::funcs::default_functions;
use ottl::{
    BoxError, Enum, EvalContext, EvalError, GetSetter, Getter, Parser, Path, PathResolver, Setter,
    TelemetrySettings, Value,
};
use tracing::info;

#[derive(Clone, Debug, Default)]
struct LogRecord {
    body: String,
    severity: i64,
    attributes: HashMap<String, Value>,
}

fn resolve_log_path(path: &Path<LogRecord>) -> Result<GetSetter<LogRecord>, BoxError> {
    match path.name() {
        "body" => Ok(GetSetter::new(
            Getter::new(|_, record: &mut LogRecord| Ok(Value::string(record.body.clone()))),
            Setter::new(|_, record: &mut LogRecord, value| match value {
                Value::String(s) => {
                    record.body = s.to_string();
                    Ok(())
                }
                other => Err(EvalError::TypeMismatch {
                    expected: "string",
                    actual: other.type_name(),
                }),
            }),
        )),
        "severity" => Ok(GetSetter::new(
            Getter::new(|_, record: &mut LogRecord| Ok(Value::Int(record.severity))),
            Setter::new(|_, record: &mut LogRecord, value| match value {
                Value::Int(severity) => {
                    record.severity = severity;
                    Ok(())
                }
                other => Err(EvalError::TypeMismatch {
                    expected: "int",
                    actual: other.type_name(),
                }),
            }),
        )),
        "attributes" => {
            let keys = path.keys();
            match keys.first().and_then(|key| key.string()) {
                Some(key) => {
                    let get_key = key.to_string();
                    let set_key = key.to_string();
                    Ok(GetSetter::new(
                        Getter::new(move |_, record: &mut LogRecord| {
                            Ok(record.attributes.get(&get_key).cloned().unwrap_or(Value::Nil))
                        }),
                        Setter::new(move |_, record: &mut LogRecord, value| {
                            record.attributes.insert(set_key.clone(), value);
                            Ok(())
                        }),
                    ))
                }
                None => Ok(GetSetter::new(
                    Getter::new(|_, record: &mut LogRecord| Ok(Value::Map(record.attributes.clone()))),
                    Setter::new(|_, record: &mut LogRecord, value| match value {
                        Value::Map(map) => {
                            record.attributes = map;
                            Ok(())
                        }
                        other => Err(EvalError::TypeMismatch {
                            expected: "map",
                            actual: other.type_name(),
                        }),
                    }),
                )),
            }
        }
        other => Err(format!("log context has no field {:?}", other).into()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let resolver: PathResolver<LogRecord> = Arc::new(resolve_log_path);
    let parser = Parser::new(
        default_functions(),
        resolver,
        TelemetrySettings::named("ottl-sandbox"),
    )
    .with_enum_resolver(Arc::new(|symbol| match symbol {
        "SEVERITY_INFO" => Some(Enum(9)),
        "SEVERITY_ERROR" => Some(Enum(17)),
        _ => None,
    }))
    .with_path_context_names(["log"]);

    let statements = [
        r#"set(log.attributes["component"], "ingest")"#,
        r#"set(log.severity, SEVERITY_ERROR) where log.body == "boom""#,
        r#"replace_pattern(log.body, "secret=[a-z]+", "secret=***")"#,
        r#"set(log.attributes["summary"], Concat([log.body, "!"], " "))"#,
    ];

    let mut record = LogRecord {
        body: "boom secret=hunter".to_string(),
        severity: 9,
        attributes: HashMap::new(),
    };

    let ectx = EvalContext::new();
    for source in statements {
        // Show the rewriter on the context-less spelling first.
        let bare = source.replace("log.", "");
        match parser.append_statement_paths_context("log", &bare) {
            Ok(rewritten) => info!(%bare, %rewritten, "context injection"),
            Err(error) => info!(%bare, %error, "context injection failed"),
        }

        let statement = match parser.parse_statement(source) {
            Ok(statement) => statement,
            Err(error) => {
                eprintln!("failed to parse {:?}: {}", source, error);
                std::process::exit(1);
            }
        };

        match statement.execute(&ectx, &mut record) {
            Ok((_, ran)) => info!(statement = %source, ran, record = ?record, "executed"),
            Err(error) => {
                eprintln!("failed to execute {:?}: {}", source, error);
                std::process::exit(1);
            }
        }
    }

    println!("final record: {:#?}", record);
}
