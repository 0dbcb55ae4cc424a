use chanvault_transport::Method;

/// A parsed message-API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route<'a> {
    /// `GET /channels/{channel}/messages`
    List { channel: &'a str },
    /// `POST /channels/{channel}/messages`
    Create { channel: &'a str },
    /// `POST /channels/{channel}/messages/bulk-delete`
    BulkDelete { channel: &'a str },
    /// `DELETE /channels/{channel}/messages/{message}`
    Delete { channel: &'a str, message: &'a str },
}

impl<'a> Route<'a> {
    pub(crate) fn parse(method: Method, endpoint: &'a str) -> Option<Self> {
        let rest = endpoint.strip_prefix("/channels/")?;
        let (channel, rest) = rest.split_once('/')?;
        let tail = rest.strip_prefix("messages")?;
        if channel.is_empty() {
            return None;
        }

        match (method, tail) {
            (Method::Get, "") => Some(Self::List { channel }),
            (Method::Post, "") => Some(Self::Create { channel }),
            (Method::Post, "/bulk-delete") => Some(Self::BulkDelete { channel }),
            (Method::Delete, tail) => {
                let message = tail.strip_prefix('/')?;
                (!message.is_empty() && !message.contains('/'))
                    .then_some(Self::Delete { channel, message })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_routes() {
        assert_eq!(
            Route::parse(Method::Get, "/channels/9/messages"),
            Some(Route::List { channel: "9" })
        );
        assert_eq!(
            Route::parse(Method::Post, "/channels/9/messages"),
            Some(Route::Create { channel: "9" })
        );
        assert_eq!(
            Route::parse(Method::Post, "/channels/9/messages/bulk-delete"),
            Some(Route::BulkDelete { channel: "9" })
        );
        assert_eq!(
            Route::parse(Method::Delete, "/channels/9/messages/123"),
            Some(Route::Delete {
                channel: "9",
                message: "123"
            })
        );
    }

    #[test]
    fn rejects_unknown_routes() {
        assert_eq!(Route::parse(Method::Get, "/guilds/9/messages"), None);
        assert_eq!(Route::parse(Method::Delete, "/channels/9/messages"), None);
        assert_eq!(Route::parse(Method::Get, "/channels/9/messages/1"), None);
        assert_eq!(Route::parse(Method::Post, "/channels//messages"), None);
    }
}
