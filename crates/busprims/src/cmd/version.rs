use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("busprims {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: busprims");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("BUSPRIMS_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("max_frame_payload: {}", busprims_frame::DEFAULT_MAX_PAYLOAD);
    println!("max_body_size: {}", busprims_message::MAX_BODY_SIZE);

    Ok(SUCCESS)
}
