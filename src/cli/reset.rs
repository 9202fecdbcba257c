use crate::cli::{load_config, open_session, ResetArgs};

pub fn execute(args: ResetArgs) -> anyhow::Result<()> {
    let config = load_config(&args.session.config, false)?;
    let (store, mut session) = open_session(&config, &args.session.conversation)?;
    let id = &args.session.conversation;

    if args.keep_context {
        session.reset();
        store.save(&session)?;
        println!("Cleared conversation '{}', context kept", id);
    } else if store.remove(id)? {
        println!("Removed conversation '{}'", id);
    } else {
        println!("No stored conversation '{}'", id);
    }
    Ok(())
}
