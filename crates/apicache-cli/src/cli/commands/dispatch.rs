use apicache_core::ApiError;

use super::super::args::{Cli, Command};
use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    let result = match cli.cmd {
        Command::Get(args) => super::request::cmd_get(&global, args).await,
        Command::Post(args) => super::request::cmd_post(&global, args).await,
        Command::Put(args) => super::request::cmd_put(&global, args).await,
        Command::Delete(args) => super::request::cmd_delete(&global, args).await,
        Command::ClearCache(args) => super::cache::cmd_clear(&global, args).await,
        Command::List => super::cache::cmd_list(&global).await,
        Command::Stats(args) => super::cache::cmd_stats(&global, args).await,
        Command::Export(args) => super::cache::cmd_export(&global, args).await,
        Command::Import(args) => super::cache::cmd_import(&global, args).await,
    };

    match result {
        Ok(()) => Ok(SUCCESS),
        Err(e) => match e.downcast_ref::<ApiError>() {
            Some(api) => {
                eprintln!("error: {api}");
                Ok(api.exit_code())
            }
            None => Err(e),
        },
    }
}
