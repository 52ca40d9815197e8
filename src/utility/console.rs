use crate::databases::ConfigDB;
use crate::utility::logger::Logger;
use crate::utility::mixed::BoxedFuture;


#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    List,
    Get(String),
    GetAll(String),
    Set(String, String),
    Append(String, String),
    Remove(String),
    Exit,
}

impl ConsoleCommand {

    /// Values may contain spaces (blacklist patterns), so everything after
    /// the key is taken verbatim.
    pub fn parse(input: &str) -> Result<ConsoleCommand, &'static str> {
        let input = input.trim();
        let (command, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
        let rest = rest.trim_start();
        let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let value = value.trim_start();

        match command {
            "ls"   => Ok(ConsoleCommand::List),
            "exit" => Ok(ConsoleCommand::Exit),
            "get" if key == "all" => match value {
                ""  => Err("Too few parameters"),
                key => Ok(ConsoleCommand::GetAll(key.to_string())),
            },
            "get" | "rm" if key.is_empty() => Err("Too few parameters"),
            "get" => Ok(ConsoleCommand::Get(key.to_string())),
            "rm"  => Ok(ConsoleCommand::Remove(key.to_string())),
            "set" | "append" if key.is_empty() || value.is_empty() => Err("Too few parameters"),
            "set"    => Ok(ConsoleCommand::Set(key.to_string(), value.to_string())),
            "append" => Ok(ConsoleCommand::Append(key.to_string(), value.to_string())),
            _ => Err("Invalid command"),
        }
    }

}

async fn execute(config: &ConfigDB, command: ConsoleCommand) -> anyhow::Result<()> {
    match command {
        ConsoleCommand::List => {
            Logger::info_long("Keys", &config.get_keys().await?.join(", "));
        }
        ConsoleCommand::Get(key) => match config.get(&key).await? {
            Some(value) => Logger::info_long(&format!("Value of {}", key), &value),
            None        => Logger::warn_long("No value for", &key),
        },
        ConsoleCommand::GetAll(key) => {
            let values = config.get_all(&key).await?;
            Logger::info_long(&format!("Values of {}", key), &values.join(", "));
        }
        ConsoleCommand::Set(key, value) => {
            config.set(&key, &value).await?;
            Logger::info_long(&format!("Set value for {}", key), &value);
        }
        ConsoleCommand::Append(key, value) => {
            config.append(&key, &value).await?;
            Logger::info_long(&format!("Appended value to {}", key), &value);
        }
        ConsoleCommand::Remove(key) => {
            config.delete(&key).await?;
            Logger::info_long("Removed key", &key);
        }
        ConsoleCommand::Exit => {}
    }
    Ok(())
}

/// Interactive editor for the `config` table on stdin. Returns on `exit` or
/// once stdin closes. Changes apply on the next start.
pub fn config_interface(config: ConfigDB) -> BoxedFuture<'static, ()> {
    Box::pin(async move {
        Logger::info_long("Connected to database", "config");
        loop {
            let input = match tokio::task::spawn_blocking(|| Logger::input("Enter a command")).await {
                Ok(Some(input)) => input,
                _               => return,
            };
            if input.is_empty() {
                continue;
            }
            match ConsoleCommand::parse(&input) {
                Ok(ConsoleCommand::Exit) => return,
                Ok(command) => {
                    if let Err(err) = execute(&config, command).await {
                        Logger::err_long("Command failed", &format!("{:#}", err));
                    }
                }
                Err(err) => Logger::warn(err),
            }
        }
    })
}
