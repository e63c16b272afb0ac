//! Outbound operation dispatch: send, registration check, contact listing.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::lifecycle::SessionManager;

/// Individual-chat address space suffix used by the platform.
const USER_SERVER: &str = "c.us";

/// Normalized contact entry returned by [`SessionManager::list_contacts`].
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
	pub name: String,
	pub number: String,
	pub pushname: Option<String>,
}

/// Strips everything but ASCII digits from a raw phone number.
///
/// Idempotent: normalizing an already-normalized string is a no-op.
pub fn normalize_number(raw: &str) -> String {
	raw.chars().filter(char::is_ascii_digit).collect()
}

/// Platform chat identifier for a normalized number.
pub fn chat_id(digits: &str) -> String {
	format!("{digits}@{USER_SERVER}")
}

impl SessionManager {
	/// Sends a text message through the named session.
	///
	/// Returns the provider-issued message identifier. No local message log
	/// is kept and no retry is applied; a failed send must be re-issued by
	/// the caller.
	pub async fn send_message(&self, name: &str, raw_number: &str, text: &str) -> Result<String> {
		if text.trim().is_empty() {
			return Err(Error::Validation("message text is required".to_string()));
		}
		let digits = validated_number(raw_number)?;
		let client = self.registry().connected_client(name)?;

		let chat = chat_id(&digits);
		debug!(target = "wa.dispatch", session = name, chat = %chat, "sending message");
		let message_id = client.send_message(&chat, text).await?;
		Ok(message_id)
	}

	/// Returns whether `raw_number` belongs to a registered platform user.
	pub async fn check_registered(&self, name: &str, raw_number: &str) -> Result<bool> {
		let digits = validated_number(raw_number)?;
		let client = self.registry().connected_client(name)?;
		Ok(client.is_registered_user(&chat_id(&digits)).await?)
	}

	/// Lists the session's individual contacts.
	///
	/// Filters the provider's full contact set to entries with a display
	/// name, in the individual address space, excluding groups and the
	/// session's own identity. Ordering is whatever the provider returned.
	pub async fn list_contacts(&self, name: &str) -> Result<Vec<Contact>> {
		let client = self.registry().connected_client(name)?;
		let own_number = self.registry().own_number(name);

		let records = client.get_contacts().await?;
		let contacts = records
			.into_iter()
			.filter(|record| {
				record.name.as_deref().is_some_and(|n| !n.is_empty())
					&& record.id.server == USER_SERVER
					&& !record.is_group
					&& !record.is_me
					&& own_number.as_deref() != Some(record.id.user.as_str())
			})
			.map(|record| Contact {
				name: record.name.unwrap_or_default(),
				number: record.id.user,
				pushname: record.pushname,
			})
			.collect();
		Ok(contacts)
	}
}

fn validated_number(raw: &str) -> Result<String> {
	if raw.trim().is_empty() {
		return Err(Error::Validation("number is required".to_string()));
	}
	let digits = normalize_number(raw);
	if digits.is_empty() {
		return Err(Error::Validation(format!(
			"number '{raw}' contains no digits"
		)));
	}
	Ok(digits)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalization_strips_non_digits() {
		assert_eq!(normalize_number("+55 (11) 9999-0000"), "551199990000");
		assert_eq!(normalize_number("5511 99990000"), "551199990000");
	}

	#[test]
	fn normalization_is_idempotent() {
		let once = normalize_number("+55 (11) 9999-0000");
		assert_eq!(normalize_number(&once), once);
	}

	#[test]
	fn chat_id_uses_individual_address_space() {
		assert_eq!(chat_id("551199990000"), "551199990000@c.us");
	}

	#[test]
	fn numbers_without_digits_fail_validation() {
		assert!(matches!(
			validated_number("++--"),
			Err(Error::Validation(_))
		));
		assert!(matches!(validated_number("   "), Err(Error::Validation(_))));
		assert_eq!(validated_number("+55 11").unwrap(), "5511");
	}
}
