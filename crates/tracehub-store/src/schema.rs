use sqlx::PgPool;

use crate::Result;

/// Idempotent schema bootstrap, run once at startup. The raw event log plus
/// the transcript tables are the source of truth; everything else is
/// rebuildable from them by reparse.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS workspaces (
            id TEXT PRIMARY KEY,
            canonical_id TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            default_branch TEXT NOT NULL DEFAULT 'main',
            first_seen_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT 'unknown-device',
            device_type TEXT NOT NULL DEFAULT 'local',
            hostname TEXT,
            os TEXT,
            arch TEXT,
            first_seen_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_seen_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS workspace_devices (
            workspace_id TEXT NOT NULL REFERENCES workspaces(id),
            device_id TEXT NOT NULL REFERENCES devices(id),
            local_path TEXT,
            git_hooks_installed BOOLEAN NOT NULL DEFAULT FALSE,
            git_hooks_prompted BOOLEAN NOT NULL DEFAULT FALSE,
            pending_git_hooks_prompt BOOLEAN NOT NULL DEFAULT FALSE,
            last_active_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (workspace_id, device_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL REFERENCES workspaces(id),
            device_id TEXT NOT NULL REFERENCES devices(id),
            cc_session_id TEXT NOT NULL,
            lifecycle TEXT NOT NULL DEFAULT 'detected',
            parse_status TEXT NOT NULL DEFAULT 'pending',
            cwd TEXT,
            git_branch TEXT,
            git_remote TEXT,
            model TEXT,
            started_at TIMESTAMPTZ NOT NULL,
            ended_at TIMESTAMPTZ,
            duration_ms BIGINT,
            transcript_s3_key TEXT,
            parse_error TEXT,
            summary TEXT,
            total_messages INTEGER,
            user_messages INTEGER,
            assistant_messages INTEGER,
            tokens_in BIGINT,
            tokens_out BIGINT,
            cache_read_tokens BIGINT,
            cache_write_tokens BIGINT,
            tool_use_count INTEGER,
            thinking_blocks INTEGER,
            subagent_count INTEGER,
            cost_estimate_usd DOUBLE PRECISION,
            initial_prompt TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_sessions_keyset ON sessions (started_at DESC, id DESC)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_workspace ON sessions (workspace_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_correlate ON sessions (workspace_id, device_id, started_at DESC)",
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            event_timestamp TIMESTAMPTZ NOT NULL,
            device_id TEXT NOT NULL,
            workspace_id TEXT,
            session_id TEXT,
            data JSONB NOT NULL,
            blob_refs JSONB NOT NULL DEFAULT '[]'::jsonb,
            ingested_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_events_session ON events (session_id)",
        r#"
        CREATE TABLE IF NOT EXISTS git_activity (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            device_id TEXT NOT NULL,
            session_id TEXT,
            activity_type TEXT NOT NULL,
            branch TEXT,
            commit_sha TEXT,
            message TEXT,
            files_changed INTEGER,
            insertions INTEGER,
            deletions INTEGER,
            activity_timestamp TIMESTAMPTZ NOT NULL,
            data JSONB NOT NULL DEFAULT '{}'::jsonb
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_git_activity_session ON git_activity (session_id)",
        "CREATE INDEX IF NOT EXISTS idx_git_activity_workspace ON git_activity (workspace_id)",
        "CREATE INDEX IF NOT EXISTS idx_git_activity_ts ON git_activity (activity_timestamp DESC)",
        r#"
        CREATE TABLE IF NOT EXISTS transcript_messages (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            line_number BIGINT NOT NULL,
            ordinal INTEGER NOT NULL,
            message_type TEXT NOT NULL,
            role TEXT,
            model TEXT,
            tokens_in BIGINT NOT NULL DEFAULT 0,
            tokens_out BIGINT NOT NULL DEFAULT 0,
            cache_read_tokens BIGINT NOT NULL DEFAULT 0,
            cache_write_tokens BIGINT NOT NULL DEFAULT 0,
            cost_usd DOUBLE PRECISION NOT NULL DEFAULT 0,
            message_timestamp TIMESTAMPTZ,
            has_text BOOLEAN NOT NULL DEFAULT FALSE,
            has_thinking BOOLEAN NOT NULL DEFAULT FALSE,
            has_tool_use BOOLEAN NOT NULL DEFAULT FALSE,
            has_tool_result BOOLEAN NOT NULL DEFAULT FALSE,
            raw_message JSONB NOT NULL,
            metadata JSONB,
            UNIQUE (session_id, ordinal)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_transcript_messages_session ON transcript_messages (session_id)",
        r#"
        CREATE TABLE IF NOT EXISTS content_blocks (
            id TEXT PRIMARY KEY,
            message_id TEXT NOT NULL REFERENCES transcript_messages(id) ON DELETE CASCADE,
            session_id TEXT NOT NULL,
            block_order INTEGER NOT NULL,
            block_type TEXT NOT NULL,
            content_text TEXT,
            thinking_text TEXT,
            tool_name TEXT,
            tool_use_id TEXT,
            tool_input JSONB,
            tool_result_id TEXT,
            is_error BOOLEAN NOT NULL DEFAULT FALSE,
            result_text TEXT,
            metadata JSONB
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_content_blocks_session ON content_blocks (session_id)",
        "CREATE INDEX IF NOT EXISTS idx_content_blocks_message ON content_blocks (message_id)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
