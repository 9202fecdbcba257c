use crate::cli::{load_config, open_session, ContextArgs};
use crate::session::Context;

pub fn execute(args: ContextArgs) -> anyhow::Result<()> {
    let config = load_config(&args.session.config, false)?;
    let (store, mut session) = open_session(&config, &args.session.conversation)?;

    let context = Context::new(args.company, args.role, args.interests);
    session.set_context(context.clone())?;
    store.save(&session)?;

    println!(
        "Context for '{}': {} at {}, interested in {}",
        session.conversation_id(),
        context.role,
        context.company,
        context.interests_phrase()
    );
    Ok(())
}
