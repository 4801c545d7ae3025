pub fn config_loaded(handle: &str, bot_name: &str) -> String {
    format!("Loaded configuration for {handle} (bot: {bot_name})")
}

pub const STARTING: &str = "Starting skyreply run...";

pub fn session_resumed(bot_name: &str) -> String {
    format!("Resumed cached session for {bot_name}")
}

pub fn session_resume_fail(err: &str) -> String {
    format!("Could not resume cached session, logging in: {err}")
}

pub fn logged_in(handle: &str) -> String {
    format!("Logged in as {handle}")
}

pub fn session_load_fail(err: &str) -> String {
    format!("Failed to load cached session: {err}")
}

pub fn session_save_fail(err: &str) -> String {
    format!("Failed to persist session: {err}")
}

pub fn dedup_read_fail(err: &str) -> String {
    format!("Failed to read replied posts: {err}")
}

pub const DEDUP_FAIL_OPEN: &str =
    "Continuing with an empty replied set (dedup_fail_open); each mention is looked up before publishing";

pub fn mentions_found(count: usize) -> String {
    format!("Found {count} unanswered mention(s)")
}

pub const NO_MENTIONS: &str = "No new mentions.";

pub fn post_missing(uri: &str) -> String {
    format!("Mentioned post {uri} could not be resolved, skipping")
}

pub fn replying(uri: &str) -> String {
    format!("Replying to {uri}...")
}

pub fn thread_split(uri: &str, parts: usize) -> String {
    format!("Reply to {uri} is over the limit, posting a thread of {parts} part(s)")
}

pub fn empty_split(uri: &str) -> String {
    format!("Split of the reply to {uri} returned no parts, leaving the mention for the next run")
}

pub fn mention_failed(uri: &str, err: &str) -> String {
    format!("Failed to reply to {uri}: {err}")
}

pub fn replied(uri: &str, posts: usize) -> String {
    format!("Replied to {uri} with {posts} post(s)")
}

pub fn duplicate_record(uri: &str, posts: usize) -> String {
    format!("Reply to {uri} was already recorded by another run; {posts} duplicate post(s) were published")
}

pub fn already_replied(uri: &str) -> String {
    format!("Skipping {uri}: already replied")
}

pub fn recheck_fail(uri: &str, err: &str) -> String {
    format!("Could not check whether {uri} was answered, replying anyway: {err}")
}

pub fn record_fail(uri: &str, err: &str) -> String {
    format!("Published reply to {uri} but could not record it: {err}")
}

pub fn task_panicked(err: &str) -> String {
    format!("Mention task panicked: {err}")
}
