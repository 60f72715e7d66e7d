use super::OutgoingEmail;

fn wrap_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: Arial, sans-serif; background-color: #f5f5f5; padding: 24px;">
  <div style="max-width: 560px; margin: 0 auto; background: #ffffff; padding: 32px; border-radius: 8px;">
    <h2 style="margin-top: 0;">{title}</h2>
    {body}
  </div>
</body>
</html>"#
    )
}

pub fn verification_email(
    frontend_url: &str,
    to: &str,
    token: &str,
    code: &str,
    ttl_minutes: i64,
) -> OutgoingEmail {
    let link = format!(
        "{}/verify-email?token={}&email={}",
        frontend_url.trim_end_matches('/'),
        token,
        to
    );
    let text = format!(
        "Verify your email address.\n\nOpen this link: {link}\nor enter the code {code}.\n\nThe code expires in {ttl_minutes} minutes."
    );
    let html = wrap_html(
        "Verify your email",
        &format!(
            r#"<p>Click the link below to verify your email address.</p>
    <p><a href="{link}">Verify email</a></p>
    <p>Or enter this code: <strong>{code}</strong></p>
    <p style="color: #666;">The code expires in {ttl_minutes} minutes.</p>"#
        ),
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify your email".to_string(),
        text,
        html,
    }
}

pub fn password_reset_email(frontend_url: &str, to: &str, token: &str) -> OutgoingEmail {
    let link = format!(
        "{}/reset-password?token={}",
        frontend_url.trim_end_matches('/'),
        token
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        text: format!(
            "A password reset was requested for your account.\n\nReset it here: {link}\n\nThe link expires in 1 hour. Ignore this email if you did not ask for it."
        ),
        html: wrap_html(
            "Reset your password",
            &format!(
                r#"<p>A password reset was requested for your account.</p>
    <p><a href="{link}">Reset password</a></p>
    <p style="color: #666;">The link expires in 1 hour. Ignore this email if you did not ask for it.</p>"#
            ),
        ),
    }
}

pub fn company_rejected_email(to: &str, company_name: &str, reason: Option<&str>) -> OutgoingEmail {
    let reason = reason.filter(|r| !r.trim().is_empty()).unwrap_or("No reason given");
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Verification for {company_name} was not approved"),
        text: format!(
            "Your company verification for {company_name} was rejected.\n\nReason: {reason}\n\nYou can update your documents and submit again."
        ),
        html: wrap_html(
            "Company verification rejected",
            &format!(
                r#"<p>Your company verification for <strong>{company_name}</strong> was rejected.</p>
    <p>Reason: {reason}</p>
    <p>You can update your documents and submit again.</p>"#
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link_and_code() {
        let mail = verification_email("http://localhost:3000/", "a@b.com", "tok123", "654321", 10);
        assert_eq!(mail.to, "a@b.com");
        assert!(mail
            .text
            .contains("http://localhost:3000/verify-email?token=tok123&email=a@b.com"));
        assert!(mail.html.contains("654321"));
    }

    #[test]
    fn test_reset_link() {
        let mail = password_reset_email("https://jobs.example", "a@b.com", "abc");
        assert!(mail.text.contains("https://jobs.example/reset-password?token=abc"));
    }

    #[test]
    fn test_rejection_reason_default() {
        let mail = company_rejected_email("o@acme.com", "Acme", None);
        assert!(mail.text.contains("No reason given"));
        let mail = company_rejected_email("o@acme.com", "Acme", Some("Blurry licence"));
        assert!(mail.html.contains("Blurry licence"));
    }
}
