use actix_web::web::Data;
use actix_web::{App, HttpServer};
use flexi_logger::{Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode};
use std::io::Write;
use std::sync::Arc;
use zeroize::Zeroizing;

use tasknest_common::db::create_db_thread_pool;
use tasknest_common::directory::admin_api::AdminApiDirectory;
use tasknest_common::directory::{DirectoryClient, UserDirectory};
use tasknest_common::email::senders::{MockSender, SmtpRelay};
use tasknest_common::email::{EmailSender, SendEmail};
use tasknest_common::store::{PostgresStore, ResetCodeRepo, ResetCodeStore};

mod env;
mod handlers;
mod services;

use handlers::reset::ResetPolicy;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut port = 9000u16;

    let mut args = std::env::args();

    // Eat the first argument, which is the relative path to the executable
    args.next();

    while let Some(arg) = args.next() {
        match arg.to_lowercase().as_str() {
            "--port" => {
                let port_str = {
                    let next_arg = args.next();

                    match next_arg {
                        Some(s) => s,
                        None => {
                            eprintln!("ERROR: --port option specified but no port was given");
                            std::process::exit(1);
                        }
                    }
                };

                port = {
                    let port_result = port_str.parse::<u16>();

                    match port_result {
                        Ok(p) => p,
                        Err(_) => {
                            eprintln!("ERROR: Incorrect format for port. Integer expected");
                            std::process::exit(1);
                        }
                    }
                };

                continue;
            }
            a => {
                eprintln!("ERROR: Invalid argument: {}", &a);
                std::process::exit(1);
            }
        }
    }

    let _logger = Logger::try_with_str(&env::CONF.log_level)
        .expect(
            "Invalid log level. Options: ERROR, WARN, INFO, DEBUG, TRACE. \
             Example: `info, my::critical::module=trace`",
        )
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
        .expect("Failed to start logger");

    log::info!("Connecting to database...");

    let db_uri = Zeroizing::new(format!(
        "postgres://{}:{}@{}:{}/{}",
        env::CONF.db_username,
        env::CONF.db_password,
        env::CONF.db_hostname,
        env::CONF.db_port,
        env::CONF.db_name,
    ));

    let db_thread_pool = create_db_thread_pool(
        &db_uri,
        env::CONF.db_max_connections,
        env::CONF.db_idle_timeout,
    );

    log::info!("Successfully created database connection pool");

    let store: Box<dyn ResetCodeStore> = Box::new(PostgresStore::new(&db_thread_pool));
    let store: ResetCodeRepo = Arc::new(store);

    let smtp_sender: Box<dyn SendEmail> = if env::CONF.email_enabled {
        log::info!("Connecting to SMTP relay...");

        let relay = SmtpRelay::with_credentials(
            &env::CONF.smtp_username,
            &env::CONF.smtp_key,
            &env::CONF.smtp_address,
            env::CONF.max_smtp_connections,
            env::CONF.smtp_idle_timeout,
        )
        .expect("Failed to connect to SMTP relay");

        match relay.test_connection().await {
            Ok(true) => (),
            Ok(false) => panic!("Failed to connect to SMTP relay"),
            Err(e) => panic!("Failed to connect to SMTP relay: {e}"),
        }

        log::info!("Successfully connected to SMTP relay");

        Box::new(relay)
    } else {
        log::info!("Emails are disabled. Using mock SMTP sender.");
        Box::new(MockSender::new())
    };
    let smtp_sender: EmailSender = Arc::new(smtp_sender);

    let directory: Box<dyn UserDirectory> = Box::new(
        AdminApiDirectory::new(
            &env::CONF.directory_url,
            &env::CONF.directory_service_key,
            env::CONF.directory_request_timeout,
        )
        .expect("Failed to build directory client"),
    );
    let directory: DirectoryClient = Arc::new(directory);

    let reset_policy = ResetPolicy {
        code_lifetime: env::CONF.reset_code_lifetime,
        email_from: env::CONF.email_from_address.clone(),
        email_reply_to: env::CONF.email_reply_to_address.clone(),
        directory_page_size: env::CONF.directory_page_size,
        directory_max_pages: env::CONF.directory_max_pages,
    };

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(store.clone()))
            .app_data(Data::new(smtp_sender.clone()))
            .app_data(Data::new(directory.clone()))
            .app_data(Data::new(reset_policy.clone()))
            .configure(services::api::configure)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(env::CONF.actix_worker_count)
    .bind(format!("127.0.0.1:{}", &port))?
    .run()
    .await?;

    Ok(())
}
