use crate::cli::{load_config, open_session, ChatArgs};
use crate::provider::create_collaborators;
use crate::runner::{Pipeline, PipelineSettings};

pub async fn execute(args: ChatArgs) -> anyhow::Result<()> {
    let config = load_config(&args.session.config, true)?;
    let (store, mut session) = open_session(&config, &args.session.conversation)?;

    let pipeline = Pipeline::new(
        create_collaborators(&config)?,
        PipelineSettings::from_config(&config),
    );
    let reply = pipeline.chat(&mut session, &args.message).await?;

    store.save(&session)?;
    println!("{}", reply);
    Ok(())
}
