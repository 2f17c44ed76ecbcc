//-
// Copyright (c) 2026, Jason Lingle
//
// This file is part of Letterbox.
//
// Letterbox is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Letterbox is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Letterbox. If not, see <http://www.gnu.org/licenses/>.

use crate::mime::message::MimeMessage;

/// A message with an RFC 2047 subject and a folded recipient list.
pub static ENCODED_SUBJECT: &[u8] = b"\
From: Alice <alice@example.com>\r\n\
To: bob@example.com,\r\n carol@example.com\r\n\
Subject: =?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?=\r\n\
Date: Fri, 21 Nov 1997 09:55:06 -0600\r\n\
Message-ID: <1234@example.com>\r\n\
\r\n\
Hello.\r\n";

/// A multipart with a quoted-printable Latin-1 part, a base64 HTML part, and
/// an attachment that is not text.
pub static MULTIPART_ALTERNATIVE: &[u8] = b"\
From: Alice <alice@example.com>\n\
Subject: Parts\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"XyZ\"\n\
\n\
This is the preamble.\n\
--XyZ\n\
Content-Type: text/plain; charset=iso-8859-1\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
Plain caf=E9 with a soft=\n\
 break\n\
--XyZ\n\
Content-Type: text/html; charset=utf-8\n\
Content-Transfer-Encoding: base64\n\
\n\
PGI+Qm9sZDwvYj4gdGV4dA==\n\
--XyZ  \n\
Content-Type: image/png\n\
Content-Transfer-Encoding: base64\n\
\n\
iVBORw0KGgo=\n\
--XyZ--\n\
This is the epilogue.\n";

/// Build the `j`th message of the standard 100-message test set.
///
/// The subject contains `Test{j}`, `message{100-j}` and `subject`; the body
/// is `data{j} content`; the message was sent `j * 1440` seconds after the
/// epoch.
pub fn numbered_message(j: u32) -> MimeMessage {
    let mut message = MimeMessage::new();
    message.set_from("Letterbox Test <test@example.com>");
    message.set_to("Recipient <rcpt@example.com>");
    message.set_subject(&format!("Test{} message{} subject", j, 100 - j));
    message.set_date(i64::from(j) * 60 * 24, 0);
    message.set_message_id(&format!("test-{}@letterbox.example", j));
    message.set_text_body(&format!("data{} content\n", j));
    message
}
