use sqlx::{PgPool, Postgres, QueryBuilder};
use tracehub_parser::{ParseOutcome, ParsedBlock, ParsedMessage};

use crate::Result;
use crate::records::{ContentBlockRow, TranscriptMessageRow};

// Multi-row inserts stay well under Postgres' bind-parameter ceiling at this
// chunk size.
const INSERT_CHUNK: usize = 500;

/// Replace a session's transcript rows with a fresh parse, in one
/// transaction. Deleting first makes re-parse idempotent.
pub async fn replace_transcript(
    pool: &PgPool,
    session_id: &str,
    outcome: &ParseOutcome,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM content_blocks WHERE session_id = $1")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM transcript_messages WHERE session_id = $1")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    for chunk in outcome.messages.chunks(INSERT_CHUNK) {
        insert_message_chunk(&mut tx, session_id, chunk).await?;
    }
    for chunk in outcome.blocks.chunks(INSERT_CHUNK) {
        insert_block_chunk(&mut tx, session_id, chunk).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Deterministic message key: re-parsing the same transcript produces the
/// same IDs, and blocks can reference their parent without RETURNING plumbing.
pub fn message_id(session_id: &str, ordinal: i32) -> String {
    format!("{}:{}", session_id, ordinal)
}

fn block_id(session_id: &str, ordinal: i32, block_order: i32) -> String {
    format!("{}:{}:{}", session_id, ordinal, block_order)
}

async fn insert_message_chunk(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    session_id: &str,
    chunk: &[ParsedMessage],
) -> Result<()> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO transcript_messages \
         (id, session_id, line_number, ordinal, message_type, role, model, \
          tokens_in, tokens_out, cache_read_tokens, cache_write_tokens, cost_usd, \
          message_timestamp, has_text, has_thinking, has_tool_use, has_tool_result, \
          raw_message, metadata) ",
    );
    qb.push_values(chunk, |mut b, message| {
        b.push_bind(message_id(session_id, message.ordinal))
            .push_bind(session_id.to_string())
            .push_bind(message.line_number)
            .push_bind(message.ordinal)
            .push_bind(message.message_type.as_str())
            .push_bind(message.role.clone())
            .push_bind(message.model.clone())
            .push_bind(message.tokens_in)
            .push_bind(message.tokens_out)
            .push_bind(message.cache_read_tokens)
            .push_bind(message.cache_write_tokens)
            .push_bind(message.cost_usd)
            .push_bind(message.timestamp)
            .push_bind(message.has_text)
            .push_bind(message.has_thinking)
            .push_bind(message.has_tool_use)
            .push_bind(message.has_tool_result)
            .push_bind(message.raw_message.clone())
            .push_bind(message.metadata.clone());
    });

    qb.build().execute(&mut **tx).await?;
    Ok(())
}

async fn insert_block_chunk(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    session_id: &str,
    chunk: &[ParsedBlock],
) -> Result<()> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO content_blocks \
         (id, message_id, session_id, block_order, block_type, content_text, \
          thinking_text, tool_name, tool_use_id, tool_input, tool_result_id, \
          is_error, result_text, metadata) ",
    );
    qb.push_values(chunk, |mut b, block| {
        b.push_bind(block_id(session_id, block.message_ordinal, block.block_order))
            .push_bind(message_id(session_id, block.message_ordinal))
            .push_bind(session_id.to_string())
            .push_bind(block.block_order)
            .push_bind(block.kind.as_str())
            .push_bind(block.content_text.clone())
            .push_bind(block.thinking_text.clone())
            .push_bind(block.tool_name.clone())
            .push_bind(block.tool_use_id.clone())
            .push_bind(block.tool_input.clone())
            .push_bind(block.tool_result_id.clone())
            .push_bind(block.is_error)
            .push_bind(block.result_text.clone())
            .push_bind(block.metadata.clone());
    });

    qb.build().execute(&mut **tx).await?;
    Ok(())
}

pub async fn list_messages(pool: &PgPool, session_id: &str) -> Result<Vec<TranscriptMessageRow>> {
    let rows = sqlx::query_as::<_, TranscriptMessageRow>(
        "SELECT * FROM transcript_messages WHERE session_id = $1 ORDER BY ordinal ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_blocks(pool: &PgPool, session_id: &str) -> Result<Vec<ContentBlockRow>> {
    let rows = sqlx::query_as::<_, ContentBlockRow>(
        "SELECT * FROM content_blocks WHERE session_id = $1 ORDER BY message_id ASC, block_order ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Row counts for invariant checks (reparse convergence).
pub async fn counts(pool: &PgPool, session_id: &str) -> Result<(i64, i64)> {
    let (messages,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM transcript_messages WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
    let (blocks,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM content_blocks WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
    Ok((messages, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_ids() {
        assert_eq!(message_id("cc-A", 0), "cc-A:0");
        assert_eq!(block_id("cc-A", 0, 2), "cc-A:0:2");
        // Same inputs, same IDs: reparse converges on identical keys.
        assert_eq!(message_id("cc-A", 7), message_id("cc-A", 7));
    }
}
