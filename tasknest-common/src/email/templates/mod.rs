use std::time::Duration;

pub struct ResetCodeMessage {}

impl ResetCodeMessage {
    pub fn generate(code: &str, code_lifetime: Duration) -> String {
        format!(
            "<html>
               <head>
                 <style>
                   body {{
                     font-family: Arial, sans-serif;
                     text-align: center;
                   }}
                 </style>
               </head>
             <body>
               <h1>Tasknest Password Reset Code</h1>
               <h2 style=\"font-family: 'Courier New', monospace; user-select: all; \
               -webkit-user-select: all;\"><b>{}</b></h2>
               <p>Enter this code in the app to choose a new password. \
               <b>Your code expires in {} minutes.</b></p>
               <br />
               <p><i>Didn't request a password reset? You can safely ignore this \
               email.</i></p>
             </body>
             </html>",
            code,
            code_lifetime.as_secs() / 60,
        )
    }
}
