use crate::cli::{load_config, open_session, SessionArgs};

pub fn execute(args: SessionArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config, false)?;
    let (_, session) = open_session(&config, &args.conversation)?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}
